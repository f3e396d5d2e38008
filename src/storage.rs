//! Graph file persistence: a `GraphView` as pretty-printed JSON.

use crate::error::{ApiError, StorageError};
use crate::graph::GraphView;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load and validate a graph file. Duplicate node ids are rejected.
pub fn load_graph<P: AsRef<Path>>(path: P) -> Result<GraphView, StorageError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let view: GraphView =
        serde_json::from_slice(&bytes).map_err(|e| StorageError::InvalidGraph {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    view.validate().map_err(|e| match e {
        ApiError::DuplicateNode(node_id) => StorageError::DuplicateNode(node_id),
        other => StorageError::InvalidGraph {
            path: path.display().to_string(),
            message: other.to_string(),
        },
    })?;
    debug!(
        path = %path.display(),
        nodes = view.nodes.len(),
        edges = view.edges.len(),
        "Loaded graph file"
    );
    Ok(view)
}

/// Write `view` to `path` through a temporary file and rename.
pub fn save_graph<P: AsRef<Path>>(path: P, view: &GraphView) -> Result<(), StorageError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let serialized = serde_json::to_vec_pretty(view).map_err(|e| StorageError::InvalidGraph {
        path: path.display().to_string(),
        message: format!("Failed to serialize graph: {}", e),
    })?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &serialized)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::IoError(e));
    }
    debug!(path = %path.display(), nodes = view.nodes.len(), "Saved graph file");
    Ok(())
}

//! Active view store.
//!
//! The root graph plus an optional scoped subview. Readers see the scoped view
//! while one is active; writers go through one transform that is applied to both
//! copies so a mirrored node never diverges.

use crate::error::ApiError;
use crate::graph::{DialogNode, GraphView};
use crate::types::NodeID;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Node transform used for every graph write. `None` keeps the node unchanged.
pub type NodeTransform<'a> = &'a (dyn Fn(&DialogNode) -> Option<DialogNode> + Send + Sync);

/// A nested subgraph currently being navigated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedView {
    /// Container node in the root graph this scope was entered from.
    pub container_id: NodeID,
    pub view: GraphView,
}

/// Authoritative graph source and mutation sink
pub trait ActiveView: Send + Sync {
    /// Current authoritative view: the scoped subview when active, the root otherwise.
    fn snapshot(&self) -> GraphView;

    /// Rebuild the node collections from `transform`. Applied to the root and, when
    /// active, to the scoped view. Returns how many nodes changed in the authoritative view.
    fn update_nodes(&self, transform: NodeTransform<'_>) -> usize;

    /// The scoped subview, if navigation into a nested graph is active.
    fn scoped_view(&self) -> Option<ScopedView>;
}

fn rebuild(nodes: &[DialogNode], transform: NodeTransform<'_>) -> (Vec<DialogNode>, usize) {
    let mut changed = 0usize;
    let rebuilt = nodes
        .iter()
        .map(|node| match transform(node) {
            Some(updated) => {
                changed += 1;
                updated
            }
            None => node.clone(),
        })
        .collect();
    (rebuilt, changed)
}

/// In-memory root graph with an optional scoped subview
#[derive(Debug, Default)]
pub struct GraphStore {
    root: RwLock<GraphView>,
    scoped: RwLock<Option<ScopedView>>,
}

impl GraphStore {
    pub fn new(root: GraphView) -> Self {
        Self {
            root: RwLock::new(root),
            scoped: RwLock::new(None),
        }
    }

    /// Enter a nested subgraph. The container must exist in the root graph.
    pub fn enter_scope(&self, container_id: &str, view: GraphView) -> Result<(), ApiError> {
        if !self.root.read().contains(container_id) {
            return Err(ApiError::NodeNotFound(container_id.to_string()));
        }
        view.validate()?;
        *self.scoped.write() = Some(ScopedView {
            container_id: container_id.to_string(),
            view,
        });
        Ok(())
    }

    pub fn exit_scope(&self) -> Option<ScopedView> {
        self.scoped.write().take()
    }

    pub fn root_snapshot(&self) -> GraphView {
        self.root.read().clone()
    }

    pub fn replace_root(&self, view: GraphView) -> Result<(), ApiError> {
        view.validate()?;
        *self.root.write() = view;
        Ok(())
    }
}

impl ActiveView for GraphStore {
    fn snapshot(&self) -> GraphView {
        if let Some(scoped) = self.scoped.read().as_ref() {
            return scoped.view.clone();
        }
        self.root.read().clone()
    }

    fn update_nodes(&self, transform: NodeTransform<'_>) -> usize {
        let root_changed = {
            let mut root = self.root.write();
            let (nodes, changed) = rebuild(&root.nodes, transform);
            root.nodes = nodes;
            changed
        };

        let mut scoped = self.scoped.write();
        match scoped.as_mut() {
            Some(scope) => {
                let (nodes, changed) = rebuild(&scope.view.nodes, transform);
                scope.view.nodes = nodes;
                changed
            }
            None => root_changed,
        }
    }

    fn scoped_view(&self) -> Option<ScopedView> {
        self.scoped.read().clone()
    }
}

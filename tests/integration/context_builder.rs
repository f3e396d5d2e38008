//! Context building against graphs loaded from disk.

use dialogen::context::builder::{build_context, ContextRequest};
use dialogen::graph::{DialogNode, Edge, GraphView};
use dialogen::storage::{load_graph, save_graph};
use tempfile::TempDir;

fn ids(nodes: &[dialogen::context::builder::ContextNode]) -> Vec<&str> {
    nodes.iter().map(|node| node.id.as_str()).collect()
}

/// guard -> (fight | flee) -> end, plus a second opener feeding `fight`.
fn branching() -> GraphView {
    GraphView::new(
        vec![
            DialogNode::new("guard", "dialog", "Halt!"),
            DialogNode::new("bribe", "dialog", "Here's some gold."),
            DialogNode::new("fight", "choice", "Draw your sword"),
            DialogNode::new("flee", "choice", "Run"),
            DialogNode::new("end", "narration", "Silence falls."),
        ],
        vec![
            Edge::new("guard", "fight"),
            Edge::new("guard", "flee"),
            Edge::new("bribe", "fight"),
            Edge::new("fight", "end"),
            Edge::new("flee", "end"),
            Edge::new("end", "ghost"),
        ],
    )
    .unwrap()
}

#[test]
fn loaded_graph_yields_same_context() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("graph.json");
    save_graph(&path, &branching()).unwrap();
    let loaded = load_graph(&path).unwrap();

    let request = ContextRequest::default().with_siblings(true);
    let from_disk = build_context("fight", &loaded, &request).unwrap();
    let in_memory = build_context("fight", &branching(), &request).unwrap();
    assert_eq!(from_disk, in_memory);
}

#[test]
fn multiple_parents_and_dangling_edges() {
    let context = build_context("fight", &branching(), &ContextRequest::default()).unwrap();
    assert_eq!(ids(&context.previous), vec!["guard", "bribe"]);
    assert_eq!(ids(&context.next), vec!["end"]);
    assert!(context.siblings.is_empty());

    let end = build_context("end", &branching(), &ContextRequest::default()).unwrap();
    assert!(end.next.is_empty());
    let previous = ids(&end.previous);
    assert_eq!(previous.len(), 4);
    assert_eq!(&previous[..2], &["fight", "flee"]);
}

#[test]
fn siblings_are_opt_in() {
    let request = ContextRequest::default().with_siblings(true);
    let context = build_context("fight", &branching(), &request).unwrap();
    assert_eq!(ids(&context.siblings), vec!["flee"]);
    assert!(context.summary.contains("\"siblings\""));
}

#[test]
fn isolate_ignores_topology() {
    let request = ContextRequest::default()
        .isolated(true)
        .with_siblings(true)
        .with_next_override(vec!["end".to_string()]);
    let context = build_context("fight", &branching(), &request).unwrap();
    assert!(context.previous.is_empty());
    assert!(context.next.is_empty());
    assert!(context.siblings.is_empty());
    assert_eq!(context.current.text, "Draw your sword");
}

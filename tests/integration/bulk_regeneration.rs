//! Bulk regeneration through the executor: ordering, progress events, failure
//! isolation and runs against a graph that changes underneath them.

use crate::integration::test_utils::{fast_settings, graph, Harness, ScriptedService};
use dialogen::context::generation::{BulkOptions, RegenerationPlan};
use dialogen::error::{ApiError, FailureKind};
use dialogen::graph::{GraphStore, ProcessingStatus};
use dialogen::telemetry::{LifecycleEvent, ProgressUpdate, RegenerationEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn percents(events: &[RegenerationEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            RegenerationEvent::Progress(ProgressUpdate::Percent { value }) => Some(*value),
            _ => None,
        })
        .collect()
}

fn lifecycle(events: &[RegenerationEvent]) -> Vec<LifecycleEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            RegenerationEvent::Lifecycle(lifecycle) => Some(lifecycle.clone()),
            _ => None,
        })
        .collect()
}

fn finished(events: &[RegenerationEvent]) -> Vec<(bool, String)> {
    events
        .iter()
        .filter_map(|event| match event {
            RegenerationEvent::Progress(ProgressUpdate::Finished { ok, summary }) => {
                Some((*ok, summary.clone()))
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn chain_regenerates_in_order_with_progress() {
    let harness = Harness::new(
        graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]),
        ScriptedService::new(),
    );
    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();

    let summary = harness
        .executor
        .execute(plan, &BulkOptions::default())
        .await
        .unwrap();

    assert_eq!(harness.service.called_ids(), vec!["a", "b", "c"]);
    assert_eq!(summary.generated, vec!["a", "b", "c"]);
    assert!(summary.is_success());
    for id in ["a", "b", "c"] {
        let node = harness.node(id);
        assert_eq!(node.text, format!("{} v2", id));
        assert_eq!(node.status, ProcessingStatus::Idle);
        assert!(node.error.is_none());
    }

    let events = harness.drain();
    assert_eq!(percents(&events), vec![33, 67, 100]);
    assert_eq!(
        lifecycle(&events),
        vec![
            LifecycleEvent::BulkStarted {
                start: "a".to_string(),
                total: 3,
            },
            LifecycleEvent::BulkCompleted { count: 3 },
            LifecycleEvent::FocusRequested {
                node_id: "a".to_string(),
            },
        ]
    );
    let done = finished(&events);
    assert_eq!(done.len(), 1);
    assert!(done[0].0);
    assert!(matches!(
        events.last(),
        Some(RegenerationEvent::Progress(ProgressUpdate::Finished { ok: true, .. }))
    ));
    assert!(!harness.executor.is_running());
}

#[tokio::test]
async fn downstream_nodes_see_regenerated_parents() {
    let harness = Harness::new(
        graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]),
        ScriptedService::new(),
    );
    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();
    harness
        .executor
        .execute(plan, &BulkOptions::default())
        .await
        .unwrap();

    let context = harness.service.context_for("c").unwrap();
    let previous: Vec<&str> = context.previous.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(previous, vec!["b v2", "a v2"]);
}

#[tokio::test]
async fn cycle_terminates_and_visits_each_node_once() {
    let harness = Harness::new(
        graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]),
        ScriptedService::new(),
    );
    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();
    assert_eq!(plan.order, vec!["a", "b", "c"]);

    let summary = harness
        .executor
        .execute(plan, &BulkOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.generated.len(), 3);
    assert_eq!(harness.service.called_ids().len(), 3);
}

#[tokio::test]
async fn timeout_is_isolated_to_its_node() {
    let harness = Harness::new(
        graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]),
        ScriptedService::new().fail("b", "Request timed out"),
    );
    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();

    let summary = harness
        .executor
        .execute(plan, &BulkOptions::default())
        .await
        .unwrap();

    let b = harness.node("b");
    assert_eq!(b.status, ProcessingStatus::Timeout);
    assert_eq!(b.text, "b v1");
    assert_eq!(b.error.as_deref(), Some("Request timed out"));

    let c = harness.node("c");
    assert_eq!(c.status, ProcessingStatus::Idle);
    assert_eq!(c.text, "c v2");

    assert_eq!(summary.generated, vec!["a", "c"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, FailureKind::Timeout);
    assert_eq!(summary.timeouts(), 1);

    let events = harness.drain();
    assert!(events.iter().any(|event| matches!(
        event,
        RegenerationEvent::Progress(ProgressUpdate::NodeFailed { node_id, kind: FailureKind::Timeout, .. })
            if node_id == "b"
    )));
    assert!(lifecycle(&events).contains(&LifecycleEvent::BulkCompleted { count: 2 }));
    let done = finished(&events);
    assert!(!done[0].0);
    assert!(done[0].1.contains("failed=1"));
}

#[tokio::test]
async fn generic_failure_marks_error() {
    let harness = Harness::new(
        graph(&["a", "b"], &[("a", "b")]),
        ScriptedService::new().fail("a", "model exploded"),
    );
    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();
    let summary = harness
        .executor
        .execute(plan, &BulkOptions::default())
        .await
        .unwrap();

    let a = harness.node("a");
    assert_eq!(a.status, ProcessingStatus::Error);
    assert_eq!(a.error.as_deref(), Some("model exploded"));
    assert_eq!(summary.failed[0].kind, FailureKind::Failed);
    assert_eq!(harness.node("b").text, "b v2");
}

#[tokio::test]
async fn node_removed_mid_run_is_counted_missing() {
    let store = Arc::new(GraphStore::new(graph(
        &["a", "b", "c"],
        &[("a", "b"), ("b", "c")],
    )));
    let hook_store = store.clone();
    let service = ScriptedService::new().with_hook(move |node_id| {
        if node_id == "b" {
            hook_store
                .replace_root(graph(&["a", "b"], &[("a", "b")]))
                .unwrap();
        }
    });
    let harness = Harness::with_store(store, service, fast_settings());
    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();

    let summary = harness
        .executor
        .execute(plan, &BulkOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.missing, vec!["c"]);
    assert_eq!(summary.generated, vec!["a", "b"]);
    assert!(summary.is_success());
    assert_eq!(harness.service.called_ids(), vec!["a", "b"]);

    let root = harness.store.root_snapshot();
    assert!(!root.contains("c"));
    assert_eq!(root.node("a").unwrap().text, "a v2");
    assert_eq!(root.node("b").unwrap().text, "b v2");
}

#[tokio::test]
async fn isolated_run_sends_empty_context() {
    let harness = Harness::new(
        graph(&["a", "b"], &[("a", "b")]),
        ScriptedService::new(),
    );
    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();
    let options = BulkOptions {
        ignore_connections: true,
        focus_on_complete: false,
        ..Default::default()
    };
    harness.executor.execute(plan, &options).await.unwrap();

    assert!(harness.service.context_for("b").unwrap().is_empty());
    let events = harness.drain();
    assert!(!lifecycle(&events)
        .iter()
        .any(|event| matches!(event, LifecycleEvent::FocusRequested { .. })));
}

#[tokio::test]
async fn missing_start_is_not_found_without_mutation() {
    let harness = Harness::new(graph(&["a"], &[]), ScriptedService::new());
    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();
    harness
        .store
        .replace_root(graph(&["z"], &[]))
        .unwrap();
    let before = harness.store.root_snapshot();

    let err = harness
        .executor
        .execute(plan, &BulkOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NodeNotFound(id) if id == "a"));
    assert_eq!(harness.store.root_snapshot(), before);
    assert!(harness.service.called_ids().is_empty());
    let done = finished(&harness.drain());
    assert_eq!(done.len(), 1);
    assert!(!done[0].0);
}

#[tokio::test(start_paused = true)]
async fn overlapping_run_is_rejected_while_first_continues() {
    let harness = Harness::new(
        graph(&["a", "b"], &[("a", "b")]),
        ScriptedService::new().with_delay(Duration::from_secs(5)),
    );
    let view = harness.store.root_snapshot();
    let first_plan = RegenerationPlan::build("a", &view).unwrap();
    let second_plan = RegenerationPlan::build("b", &view).unwrap();
    let options = BulkOptions::default();

    let (first, second) = tokio::join!(
        harness.executor.execute(first_plan, &options),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            harness.executor.execute(second_plan, &options).await
        }
    );

    assert!(matches!(second, Err(ApiError::RunInProgress)));
    let first = first.unwrap();
    assert_eq!(first.generated, vec!["a", "b"]);
    assert_eq!(harness.service.called_ids(), vec!["a", "b"]);
    assert!(!harness.executor.is_running());
}

#[tokio::test]
async fn markers_clear_after_run() {
    let harness = Harness::new(
        graph(&["a", "b"], &[("a", "b")]),
        ScriptedService::new(),
    );
    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();
    harness
        .executor
        .execute(plan, &BulkOptions::default())
        .await
        .unwrap();

    let markers = harness.executor.markers();
    assert!(!markers.active);
    assert!(markers.bulk_nodes.is_empty());
    assert!(markers.processing.is_none());
}

#[tokio::test]
async fn successes_are_written_back_in_batches() {
    let store = Arc::new(GraphStore::new(graph(
        &["a", "b", "c", "d"],
        &[("a", "b"), ("b", "c"), ("c", "d")],
    )));
    let seen: Arc<Mutex<Vec<(String, Vec<String>)>>> = Arc::new(Mutex::new(Vec::new()));
    let hook_store = store.clone();
    let hook_seen = seen.clone();
    let service = ScriptedService::new().with_hook(move |node_id| {
        let root = hook_store.root_snapshot();
        let texts = ["a", "b", "c", "d"]
            .iter()
            .map(|id| root.node(id).unwrap().text.clone())
            .collect();
        hook_seen.lock().push((node_id.to_string(), texts));
    });
    let harness = Harness::with_store(store, service, fast_settings());
    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();

    harness
        .executor
        .execute(plan, &BulkOptions::default())
        .await
        .unwrap();

    let seen = seen.lock().clone();
    let at = |id: &str| {
        seen.iter()
            .find(|(node_id, _)| node_id == id)
            .map(|(_, texts)| texts.clone())
            .unwrap()
    };
    assert_eq!(at("a"), vec!["a v1", "b v1", "c v1", "d v1"]);
    assert_eq!(at("b"), vec!["a v1", "b v1", "c v1", "d v1"]);
    assert_eq!(at("c"), vec!["a v1", "b v1", "c v1", "d v1"]);
    assert_eq!(at("d"), vec!["a v2", "b v2", "c v2", "d v1"]);

    // Buffered text still reaches the context before it is written back.
    let previous: Vec<String> = harness
        .service
        .context_for("c")
        .unwrap()
        .previous
        .iter()
        .map(|n| n.text.clone())
        .collect();
    assert_eq!(previous, vec!["b v2", "a v2"]);

    for id in ["a", "b", "c", "d"] {
        let node = harness.node(id);
        assert_eq!(node.text, format!("{} v2", id));
        assert_eq!(node.status, ProcessingStatus::Idle);
    }
}

#[tokio::test(start_paused = true)]
async fn abandoned_run_releases_markers_for_the_next_run() {
    let harness = Harness::new(
        graph(&["a", "b"], &[("a", "b")]),
        ScriptedService::new().with_delay(Duration::from_secs(5)),
    );
    let markers = harness.executor.markers_handle();
    let options = BulkOptions::default();

    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();
    let abandoned = tokio::time::timeout(
        Duration::from_secs(1),
        harness.executor.execute(plan, &options),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(harness.service.called_ids(), vec!["a"]);

    {
        let markers = markers.read();
        assert!(!markers.active);
        assert!(markers.bulk_nodes.is_empty());
        assert!(markers.processing.is_none());
    }
    let a = harness.node("a");
    assert_eq!(a.status, ProcessingStatus::Idle);
    assert_eq!(a.text, "a v1");

    let plan = RegenerationPlan::build("a", &harness.store.root_snapshot()).unwrap();
    let summary = harness.executor.execute(plan, &options).await.unwrap();
    assert_eq!(summary.generated, vec!["a", "b"]);
    assert_eq!(harness.node("b").text, "b v2");
    assert!(!markers.read().active);
}

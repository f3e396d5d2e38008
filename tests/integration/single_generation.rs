//! Single-node generation requests routed through `run_generate`.

use crate::integration::test_utils::{graph, Harness, ScriptedService};
use dialogen::context::generation::{run_generate, GenerateOutcome, GenerateRequest, GenerationMode};
use dialogen::error::{ApiError, FailureKind};
use dialogen::graph::ProcessingStatus;
use dialogen::telemetry::{ProgressUpdate, RegenerationEvent};

fn harness() -> Harness {
    Harness::new(
        graph(&["a", "b", "c"], &[("a", "b"), ("a", "c")]),
        ScriptedService::new()
            .reply("b", "  Who goes there?  ")
            .fail("c", "upstream request timed out"),
    )
}

#[tokio::test]
async fn improve_updates_only_the_target() {
    let harness = harness();
    let request = GenerateRequest::single("b", GenerationMode::Improve);

    let outcome = run_generate(&harness.executor, &request).await.unwrap();
    match outcome {
        GenerateOutcome::Node { node_id, text } => {
            assert_eq!(node_id, "b");
            assert_eq!(text, "Who goes there?");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(harness.service.modes(), vec!["improve"]);
    assert_eq!(harness.node("b").text, "Who goes there?");
    assert_eq!(harness.node("b").status, ProcessingStatus::Idle);
    assert_eq!(harness.node("a").text, "a v1");
    assert_eq!(harness.node("c").text, "c v1");
}

#[tokio::test]
async fn custom_prompt_reaches_service() {
    let harness = harness();
    let request = GenerateRequest::single(
        "a",
        GenerationMode::Custom {
            prompt: "make it menacing".to_string(),
            system_prompt: None,
        },
    );
    run_generate(&harness.executor, &request).await.unwrap();
    assert_eq!(harness.service.modes(), vec!["custom:make it menacing"]);
}

#[tokio::test]
async fn next_override_replaces_successors() {
    let harness = harness();
    let request = GenerateRequest::single("a", GenerationMode::Recreate)
        .with_next_override(Some(vec!["c".to_string(), "missing".to_string()]));
    run_generate(&harness.executor, &request).await.unwrap();

    let context = harness.service.context_for("a").unwrap();
    let next: Vec<&str> = context.next.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(next, vec!["c"]);
}

#[tokio::test]
async fn failure_sets_status_then_errors() {
    let harness = harness();
    let request = GenerateRequest::single("c", GenerationMode::Recreate);

    let err = run_generate(&harness.executor, &request).await.unwrap_err();
    assert!(matches!(err, ApiError::GenerationTimeout(_)));

    let c = harness.node("c");
    assert_eq!(c.status, ProcessingStatus::Timeout);
    assert_eq!(c.text, "c v1");
    assert!(c.error.unwrap().contains("timed out"));

    let events = harness.drain();
    assert!(events.iter().any(|event| matches!(
        event,
        RegenerationEvent::Progress(ProgressUpdate::NodeFailed { kind: FailureKind::Timeout, .. })
    )));
    assert!(matches!(
        events.last(),
        Some(RegenerationEvent::Progress(ProgressUpdate::Finished { ok: false, .. }))
    ));
}

#[tokio::test]
async fn retry_after_failure_clears_error() {
    let harness = Harness::new(graph(&["a"], &[]), ScriptedService::new());
    let mut failed = harness.node("a");
    failed.status = ProcessingStatus::Error;
    failed.error = Some("previous failure".to_string());
    harness
        .store
        .replace_root(dialogen::graph::GraphView::new(vec![failed], Vec::new()).unwrap())
        .unwrap();

    let request = GenerateRequest::single("a", GenerationMode::Recreate);
    run_generate(&harness.executor, &request).await.unwrap();

    let a = harness.node("a");
    assert_eq!(a.status, ProcessingStatus::Idle);
    assert!(a.error.is_none());
    assert_eq!(a.text, "a v2");
}

#[tokio::test]
async fn unknown_node_is_not_found_and_graph_is_untouched() {
    let harness = harness();
    let before = harness.store.root_snapshot();
    let request = GenerateRequest::single("nope", GenerationMode::Recreate);

    let err = run_generate(&harness.executor, &request).await.unwrap_err();
    assert!(matches!(err, ApiError::NodeNotFound(id) if id == "nope"));
    assert_eq!(harness.store.root_snapshot(), before);
    assert!(harness.service.called_ids().is_empty());
    assert!(matches!(
        harness.drain().as_slice(),
        [RegenerationEvent::Progress(ProgressUpdate::Finished { ok: false, .. })]
    ));
}

#[tokio::test]
async fn regenerate_request_runs_bulk() {
    let harness = harness();
    let request = GenerateRequest::regenerate_from("a");
    match run_generate(&harness.executor, &request).await.unwrap() {
        GenerateOutcome::Bulk(summary) => {
            assert_eq!(summary.plan.len(), 3);
            assert_eq!(summary.plan[0], "a");
            assert_eq!(summary.generated.len(), 2);
            assert!(!summary.generated.contains(&"c".to_string()));
            assert_eq!(summary.failed.len(), 1);
            assert_eq!(summary.failed[0].node_id, "c");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn regenerate_unknown_start_emits_failure() {
    let harness = harness();
    let request = GenerateRequest::regenerate_from("ghost");
    let err = run_generate(&harness.executor, &request).await.unwrap_err();
    assert!(matches!(err, ApiError::NodeNotFound(_)));
    assert!(matches!(
        harness.drain().as_slice(),
        [RegenerationEvent::Progress(ProgressUpdate::Finished { ok: false, .. })]
    ));
}

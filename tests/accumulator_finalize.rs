use rustc_hash::FxHashMap;
use streamloom::accumulator::StreamAccumulator;
use streamloom::events::{FinalizeOptions, FinalizeResult};
use streamloom::message::Message;
use streamloom::types::{ExecutionState, NodeKind, TokenUsage};

#[test]
fn test_finalize_states() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.finalize(FinalizeOptions::completed());
    assert_eq!(acc.tree().execution_state, ExecutionState::Completed);

    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.finalize(FinalizeOptions::failed("boom"));
    assert_eq!(acc.tree().execution_state, ExecutionState::Error);
    assert_eq!(acc.tree().error.as_deref(), Some("boom"));

    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.finalize(FinalizeOptions::stopped());
    assert_eq!(acc.tree().execution_state, ExecutionState::Interrupted);
}

#[test]
fn test_finalize_keeps_error_state_from_node_failure() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.node_start("n1", "Node", NodeKind::Agent, None);
    acc.node_error("n1", "boom");
    assert_eq!(acc.tree().execution_state, ExecutionState::Error);

    // A plain finalize with no error flag must not undo the terminal
    // transition a node failure already performed.
    acc.finalize(FinalizeOptions::completed());

    assert_eq!(acc.tree().execution_state, ExecutionState::Error);
    assert_eq!(acc.tree().error.as_deref(), Some("boom"));
    assert_eq!(acc.tree().failed_node_id.as_deref(), Some("n1"));

    let snapshot = acc.to_message_data(None);
    assert_eq!(snapshot.execution_state, ExecutionState::Error);
    assert!(!snapshot.result.unwrap().success);
    let resume = snapshot.resume_state.expect("failed run keeps a checkpoint");
    assert_eq!(resume.start_node_id.as_deref(), Some("n1"));
}

#[test]
fn test_finalize_stopped_after_node_failure_stays_error() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.node_start("n1", "Node", NodeKind::Agent, None);
    acc.node_error("n1", "boom");
    acc.finalize(FinalizeOptions::stopped());

    assert_eq!(acc.tree().execution_state, ExecutionState::Error);
    assert!(acc.to_message_data(None).resume_state.is_some());
}

#[test]
fn test_final_output_prefers_explicit_result() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.node_start("n1", "Node", NodeKind::Agent, None);
    acc.node_finish("n1", Some("node output".to_string()));
    acc.workflow_token("streamed final", None);
    acc.finalize(FinalizeOptions::with_output("explicit"));
    assert_eq!(acc.tree().final_output, "explicit");
}

#[test]
fn test_final_output_falls_back_to_workflow_stream() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.node_start("n1", "Node", NodeKind::Agent, None);
    acc.node_finish("n1", Some("node output".to_string()));
    acc.workflow_token("streamed final", None);
    // Pending workflow tokens are flushed by finalize itself.
    acc.finalize(FinalizeOptions::completed());
    assert_eq!(acc.tree().final_output, "streamed final");
    assert!(acc.tree().streaming_text.is_none());
}

#[test]
fn test_final_output_falls_back_to_last_node_output() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.node_start("n1", "Node", NodeKind::Agent, None);
    acc.node_finish("n1", Some("first".to_string()));
    acc.node_start("n2", "Node", NodeKind::Agent, None);
    acc.node_finish("n2", Some("last".to_string()));
    acc.finalize(FinalizeOptions::completed());
    assert_eq!(acc.tree().final_output, "last");
}

#[test]
fn test_final_output_empty_when_nothing_available() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.finalize(FinalizeOptions::completed());
    assert_eq!(acc.tree().final_output, "");
}

#[test]
fn test_mutation_frozen_after_finalize() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.finalize(FinalizeOptions::completed());
    assert!(acc.is_finalized());

    acc.node_start("late", "Late", NodeKind::Agent, None);
    acc.node_token("late", "text");
    acc.branch_start("late", "a", "A");
    acc.workflow_token("more", None);
    acc.flush();

    assert!(acc.tree().nodes.is_empty());
    assert!(acc.tree().branches.is_empty());
    assert!(acc.tree().streaming_text.is_none());
}

#[test]
fn test_second_finalize_only_backfills() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.finalize(FinalizeOptions::completed());
    assert_eq!(acc.tree().execution_state, ExecutionState::Completed);

    // A late error flag must not re-trigger the transition.
    let mut late = FinalizeOptions::failed("late error");
    late.result = Some(FinalizeResult {
        session_messages: Some(vec![Message::user("hi"), Message::assistant("hello")]),
        usage: Some(TokenUsage::new(50, 10)),
        last_node_id: Some("n9".into()),
        ..Default::default()
    });
    acc.finalize(late);

    assert_eq!(acc.tree().execution_state, ExecutionState::Completed);
    assert!(acc.tree().error.is_none());
    assert_eq!(acc.tree().last_active_node_id.as_deref(), Some("n9"));

    let snapshot = acc.to_message_data(None);
    assert_eq!(snapshot.session_messages.as_ref().unwrap().len(), 2);
    assert_eq!(snapshot.result.unwrap().total_tokens, 60);
}

#[test]
fn test_backfill_does_not_overwrite_populated_fields() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    let mut first = FinalizeOptions::completed();
    first.result = Some(FinalizeResult {
        output: Some("original".into()),
        usage: Some(TokenUsage::new(5, 5)),
        ..Default::default()
    });
    acc.finalize(first);

    let mut second = FinalizeOptions::completed();
    second.result = Some(FinalizeResult {
        output: Some("replacement".into()),
        usage: Some(TokenUsage::new(99, 99)),
        ..Default::default()
    });
    acc.finalize(second);

    assert_eq!(acc.tree().final_output, "original");
    assert_eq!(acc.to_message_data(None).result.unwrap().total_tokens, 10);
}

#[test]
fn test_finalize_applies_engine_node_outputs() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    let mut outputs = FxHashMap::default();
    outputs.insert("n1".to_string(), "engine says".to_string());
    let mut options = FinalizeOptions::completed();
    options.result = Some(FinalizeResult {
        node_outputs: Some(outputs),
        ..Default::default()
    });
    acc.finalize(options);

    let snapshot = acc.to_message_data(None);
    assert_eq!(snapshot.node_outputs["n1"], "engine says");
}

#[test]
fn test_reset_drops_state_but_keeps_version_monotonic() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.node_start("n1", "Node", NodeKind::Agent, None);
    acc.node_token("n1", "pending");
    let version_before = acc.version();
    assert!(acc.has_scheduled_flush());

    acc.reset();

    assert!(acc.tree().nodes.is_empty());
    assert!(!acc.has_scheduled_flush());
    assert!(!acc.is_finalized());
    assert_eq!(acc.tree().id, "wf");
    assert!(acc.version() > version_before);

    // Buffered tokens from before the reset are gone for good.
    acc.flush();
    assert!(acc.tree().nodes.is_empty());
}

#[test]
fn test_reset_after_finalize_allows_new_run() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.finalize(FinalizeOptions::failed("boom"));
    acc.reset();

    assert_eq!(acc.tree().execution_state, ExecutionState::Running);
    acc.node_start("n1", "Node", NodeKind::Agent, None);
    assert_eq!(acc.tree().nodes.len(), 1);
}

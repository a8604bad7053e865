use streamloom::accumulator::StreamAccumulator;
use streamloom::events::ToolCallEvent;
use streamloom::state::{BranchState, WorkflowTree};
use streamloom::types::{BranchStatus, NodeKind, ToolCallStatus};

fn acc_with_parallel_node() -> StreamAccumulator {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.node_start("p1", "Fan-out", NodeKind::Parallel, None);
    acc
}

#[test]
fn test_branch_start_requires_owner() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.branch_start("missing", "a", "Branch A");
    assert!(acc.tree().branches.is_empty());
}

#[test]
fn test_branch_lifecycle_with_streamed_text() {
    let mut acc = acc_with_parallel_node();
    acc.branch_start("p1", "a", "Branch A");
    acc.branch_token("p1", "a", "Part ");
    acc.branch_token("p1", "a", "1");
    // Streaming text wins over the engine-supplied output.
    acc.branch_complete("p1", "a", "Branch A", Some("Result".to_string()));

    let branch = &acc.tree().branches["p1:a"];
    assert_eq!(branch.status, BranchStatus::Completed);
    assert_eq!(branch.output, "Part 1");
    assert!(branch.streaming_text.is_none());
}

#[test]
fn test_branch_complete_uses_supplied_output_when_nothing_streamed() {
    let mut acc = acc_with_parallel_node();
    acc.branch_start("p1", "a", "Branch A");
    acc.branch_complete("p1", "a", "Branch A", Some("ignored".to_string()));
    assert_eq!(acc.tree().branches["p1:a"].output, "ignored");

    acc.branch_start("p1", "b", "Branch B");
    acc.branch_complete("p1", "b", "Branch B", None);
    assert_eq!(acc.tree().branches["p1:b"].output, "");
}

#[test]
fn test_branch_complete_creates_branch_when_owner_exists() {
    let mut acc = acc_with_parallel_node();
    // No branch_start ever arrived.
    acc.branch_complete("p1", "late", "Late branch", Some("done".to_string()));

    let branch = &acc.tree().branches["p1:late"];
    assert_eq!(branch.label, "Late branch");
    assert_eq!(branch.output, "done");
}

#[test]
fn test_branch_tokens_dropped_without_owner() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.branch_token("missing", "a", "lost");
    acc.flush();
    assert!(acc.tree().branches.is_empty());
}

#[test]
fn test_branch_tokens_interleaved_across_branches() {
    let mut acc = acc_with_parallel_node();
    acc.branch_start("p1", "a", "A");
    acc.branch_start("p1", "b", "B");
    acc.branch_token("p1", "a", "a1");
    acc.branch_token("p1", "b", "b1");
    acc.branch_token("p1", "a", "a2");
    acc.branch_token("p1", "b", "b2");
    acc.flush();

    // Per-branch order holds regardless of interleaving.
    assert_eq!(
        acc.tree().branches["p1:a"].streaming_text.as_deref(),
        Some("a1a2")
    );
    assert_eq!(
        acc.tree().branches["p1:b"].streaming_text.as_deref(),
        Some("b1b2")
    );
}

#[test]
fn test_merge_branch_key() {
    let mut acc = acc_with_parallel_node();
    acc.branch_start("p1", BranchState::MERGE_ID, BranchState::MERGE_LABEL);
    let key = WorkflowTree::branch_key("p1", BranchState::MERGE_ID);
    assert!(acc.tree().branches[&key].is_merge());
}

#[test]
fn test_tool_call_routed_to_node() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    acc.node_start("n1", "Node", NodeKind::Agent, None);
    acc.tool_call_event(ToolCallEvent {
        node_id: "n1".into(),
        branch_id: None,
        id: "t1".into(),
        name: "search".into(),
        status: ToolCallStatus::Active,
        error: None,
    });
    acc.tool_call_event(ToolCallEvent {
        node_id: "n1".into(),
        branch_id: None,
        id: "t1".into(),
        name: "search".into(),
        status: ToolCallStatus::Error,
        error: Some("timeout".into()),
    });

    let calls = &acc.tree().nodes["n1"].tool_calls;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, ToolCallStatus::Error);
    assert_eq!(calls[0].error.as_deref(), Some("timeout"));
    assert!(calls[0].started_at.is_some());
    assert!(calls[0].finished_at.is_some());
}

#[test]
fn test_tool_call_routed_to_branch() {
    let mut acc = acc_with_parallel_node();
    acc.branch_start("p1", "a", "A");
    acc.tool_call_event(ToolCallEvent {
        node_id: "p1".into(),
        branch_id: Some("a".into()),
        id: "t1".into(),
        name: "fetch".into(),
        status: ToolCallStatus::Completed,
        error: None,
    });

    let branch = &acc.tree().branches["p1:a"];
    assert_eq!(branch.tool_calls.len(), 1);
    assert!(acc.tree().nodes["p1"].tool_calls.is_empty());
}

#[test]
fn test_tool_call_unknown_owner_is_noop() {
    let mut acc = StreamAccumulator::new("wf", "Workflow");
    let version_before = acc.version();
    acc.tool_call_event(ToolCallEvent {
        node_id: "missing".into(),
        branch_id: None,
        id: "t1".into(),
        name: "noop".into(),
        status: ToolCallStatus::Active,
        error: None,
    });
    assert_eq!(acc.version(), version_before);
}

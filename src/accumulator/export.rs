//! Message-data export: immutable snapshots of the live tree for
//! persistence and transport.
//!
//! [`StreamAccumulator::to_message_data`] produces a plain, fully-owned
//! record with no shared references into the live tree, so later mutation
//! can never corrupt a persisted snapshot. Derived fields (run duration,
//! the per-node output map, and the resume checkpoint) are computed at
//! snapshot time. The resume checkpoint exists if and only if the run
//! ended in `error` or `interrupted`; a completed run has nothing to
//! resume.

use chrono::Utc;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::message::Message;
use crate::utils::json_ext::lossy_value;
use crate::state::{BranchState, HitlRequestState, NodeState, WorkflowTree};
use crate::types::{ExecutionState, NodeStatus, TokenUsage};

use super::StreamAccumulator;

/// Errors surfaced while turning a snapshot into a wire form.
#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("failed to serialize workflow message data: {0}")]
    #[diagnostic(
        code(streamloom::export::serialization),
        help("a node output or HITL payload contains a value serde_json cannot represent")
    )]
    Serialization(#[from] serde_json::Error),
}

/// The type tag carried by every exported workflow record.
pub const MESSAGE_TYPE_WORKFLOW: &str = "workflow";

/// A self-contained snapshot of one workflow run.
///
/// This is the shape the persistence collaborator stores and the transport
/// layer ships; it never aliases the live tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMessageData {
    /// Always [`MESSAGE_TYPE_WORKFLOW`].
    #[serde(rename = "type")]
    pub message_type: String,
    pub workflow_id: String,
    pub workflow_name: String,
    /// The prompt that started the run, when the caller has it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub execution_state: ExecutionState,
    pub nodes: FxHashMap<String, NodeState>,
    pub execution_order: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_node_id: Option<String>,
    pub branches: FxHashMap<String, BranchState>,
    /// Outstanding requests; omitted entirely when none are pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hitl_requests: Option<FxHashMap<String, HitlRequestState>>,
    pub final_output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_node_id: Option<String>,
    /// Per-node output map: the engine-supplied map when one was delivered
    /// at finalize, otherwise derived from committed node outputs.
    pub node_outputs: FxHashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_messages: Option<Vec<Message>>,
    /// Present iff the run ended in `error` or `interrupted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_state: Option<ResumeState>,
    /// Present once the run reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultSummary>,
}

impl WorkflowMessageData {
    /// Serialize the snapshot to a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value, ExportError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serialize the snapshot, degrading instead of failing: when the full
    /// record is unrepresentable (a HITL payload or node output serde_json
    /// cannot encode), a reduced copy with the identity and state fields
    /// survives. For persistence paths where losing fidelity beats losing
    /// the record.
    #[must_use]
    pub fn to_json_lossy(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(value) => value,
            Err(e) => {
                warn!(workflow = %self.workflow_id, error = %e, "snapshot degraded to reduced copy");
                serde_json::json!({
                    "type": self.message_type,
                    "workflow_id": self.workflow_id,
                    "workflow_name": self.workflow_name,
                    "execution_state": lossy_value(&self.execution_state),
                    "final_output": self.final_output,
                    "failed_node_id": self.failed_node_id,
                })
            }
        }
    }
}

/// Checkpoint for restarting a run that stopped before completion.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeState {
    /// The node execution should restart from; `None` means no retry is
    /// possible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_node_id: Option<String>,
    /// Outputs of nodes that completed before the stop, keyed by node id.
    pub completed_outputs: FxHashMap<String, String>,
    /// Execution order up to the stop.
    pub execution_order: Vec<String>,
    /// The last successful node's output, as a default resume input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_output: Option<String>,
}

/// Outcome summary for a terminal run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub success: bool,
    /// `latest finish − earliest start` across all nodes; falls back to
    /// "now" as the end bound while nothing has finished.
    pub duration_ms: i64,
    /// Engine-reported total when usage was delivered, else the coarse
    /// per-event estimate summed over all nodes.
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Pick the node a stopped run should restart from.
///
/// First defined value wins: explicit resume-state start id, recorded
/// failed-node id, current node id, the first `active` node in execution
/// order, the last-active node id, else `None` (no retry possible).
/// Failure and interruption populate different fields depending on how
/// execution stopped; resume has to be robust to whichever one is set.
#[must_use]
pub fn derive_start_node_id(tree: &WorkflowTree, resume: Option<&ResumeState>) -> Option<String> {
    if let Some(start) = resume.and_then(|r| r.start_node_id.clone()) {
        return Some(start);
    }
    if let Some(failed) = &tree.failed_node_id {
        return Some(failed.clone());
    }
    if let Some(current) = &tree.current_node_id {
        return Some(current.clone());
    }
    if let Some(active) = tree.execution_order.iter().find(|id| {
        tree.nodes
            .get(id.as_str())
            .is_some_and(|node| node.status == NodeStatus::Active)
    }) {
        return Some(active.clone());
    }
    tree.last_active_node_id.clone()
}

impl StreamAccumulator {
    /// Snapshot the live tree into a [`WorkflowMessageData`] record.
    ///
    /// Everything is deep-copied; derived fields (duration, per-node
    /// output map, resume checkpoint) are computed here.
    #[must_use]
    pub fn to_message_data(&self, prompt: Option<String>) -> WorkflowMessageData {
        let tree = self.tree();
        let node_outputs = self
            .node_outputs
            .clone()
            .unwrap_or_else(|| derived_node_outputs(tree));
        let resume_state = matches!(
            tree.execution_state,
            ExecutionState::Error | ExecutionState::Interrupted
        )
        .then(|| build_resume_state(tree));
        let result = tree
            .execution_state
            .is_terminal()
            .then(|| self.result_summary());

        WorkflowMessageData {
            message_type: MESSAGE_TYPE_WORKFLOW.to_string(),
            workflow_id: tree.id.clone(),
            workflow_name: tree.name.clone(),
            prompt,
            execution_state: tree.execution_state,
            nodes: tree.nodes.clone(),
            execution_order: tree.execution_order.clone(),
            current_node_id: tree.current_node_id.clone(),
            last_active_node_id: tree.last_active_node_id.clone(),
            final_node_id: self.final_node_id.clone(),
            branches: tree.branches.clone(),
            hitl_requests: (!tree.hitl_requests.is_empty()).then(|| tree.hitl_requests.clone()),
            final_output: tree.final_output.clone(),
            failed_node_id: tree.failed_node_id.clone(),
            node_outputs,
            session_messages: self.session_messages.clone(),
            resume_state,
            result,
        }
    }

    fn result_summary(&self) -> ResultSummary {
        let tree = self.tree();
        let total_tokens = self
            .usage
            .map(|u| u.total_tokens)
            .unwrap_or_else(|| estimate_total_tokens(tree));
        ResultSummary {
            success: tree.execution_state == ExecutionState::Completed,
            duration_ms: run_duration_ms(tree),
            total_tokens,
            error: tree.error.clone(),
            usage: self.usage,
        }
    }
}

/// Committed outputs of all nodes with non-empty output, keyed by local id.
fn derived_node_outputs(tree: &WorkflowTree) -> FxHashMap<String, String> {
    tree.nodes
        .iter()
        .filter(|(_, node)| !node.output.is_empty())
        .map(|(id, node)| (id.clone(), node.output.clone()))
        .collect()
}

fn build_resume_state(tree: &WorkflowTree) -> ResumeState {
    let completed_outputs: FxHashMap<String, String> = tree
        .nodes
        .iter()
        .filter(|(_, node)| node.status == NodeStatus::Completed)
        .map(|(id, node)| (id.clone(), node.output.clone()))
        .collect();
    let last_output = tree
        .execution_order
        .iter()
        .rev()
        .filter_map(|id| tree.nodes.get(id))
        .find(|node| node.status == NodeStatus::Completed && !node.output.is_empty())
        .map(|node| node.output.clone());
    ResumeState {
        start_node_id: derive_start_node_id(tree, None),
        completed_outputs,
        execution_order: tree.execution_order.clone(),
        last_output,
    }
}

/// Latest node finish minus earliest node start, in milliseconds, walking
/// nested subflow trees too. The end bound falls back to "now" while
/// nothing has finished yet; with no started node at all the duration is 0.
fn run_duration_ms(tree: &WorkflowTree) -> i64 {
    let mut earliest_start = None;
    let mut latest_finish = None;
    collect_bounds(tree, &mut earliest_start, &mut latest_finish);
    let Some(start) = earliest_start else {
        return 0;
    };
    let end = latest_finish.unwrap_or_else(Utc::now);
    (end - start).num_milliseconds().max(0)
}

fn collect_bounds(
    tree: &WorkflowTree,
    earliest_start: &mut Option<chrono::DateTime<Utc>>,
    latest_finish: &mut Option<chrono::DateTime<Utc>>,
) {
    for node in tree.nodes.values() {
        if let Some(started) = node.started_at {
            if earliest_start.map_or(true, |e| started < e) {
                *earliest_start = Some(started);
            }
        }
        if let Some(finished) = node.finished_at {
            if latest_finish.map_or(true, |l| finished > l) {
                *latest_finish = Some(finished);
            }
        }
        if let Some(sub) = node.subflow.as_deref() {
            collect_bounds(sub, earliest_start, latest_finish);
        }
    }
}

/// Sum of the coarse per-event estimates, walking nested trees.
fn estimate_total_tokens(tree: &WorkflowTree) -> u64 {
    tree.nodes
        .values()
        .map(|node| {
            node.token_estimate
                + node
                    .subflow
                    .as_deref()
                    .map(estimate_total_tokens)
                    .unwrap_or(0)
        })
        .sum()
}

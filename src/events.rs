//! Events consumed from the execution-engine collaborator.
//!
//! The engine makes one call per occurrence, fire-and-forget; [`ExecEvent`]
//! is the serializable form of those calls so they can also travel over a
//! channel into an [`AccumulatorService`](crate::service::AccumulatorService).
//! The enum is the complete consumed interface of the accumulator: every
//! variant maps to exactly one mutator.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;
use crate::state::HitlRequestState;
use crate::types::{HitlAction, NodeKind, TokenUsage, ToolCallStatus};

/// One occurrence reported by the execution engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecEvent {
    NodeStart {
        id: String,
        label: String,
        kind: NodeKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    NodeToken {
        id: String,
        text: String,
    },
    NodeReasoning {
        id: String,
        text: String,
    },
    NodeFinish {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    NodeError {
        id: String,
        error: String,
    },
    RouteSelected {
        id: String,
        route: String,
    },
    TokenUsage {
        id: String,
        usage: TokenUsage,
    },
    BranchStart {
        node_id: String,
        branch_id: String,
        label: String,
    },
    BranchToken {
        node_id: String,
        branch_id: String,
        label: String,
        text: String,
    },
    BranchReasoning {
        node_id: String,
        branch_id: String,
        label: String,
        text: String,
    },
    BranchComplete {
        node_id: String,
        branch_id: String,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    ToolCall(ToolCallEvent),
    HitlRequest(HitlRequestState),
    HitlResolve {
        request_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<HitlResponse>,
    },
    WorkflowToken {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        meta: Option<Value>,
    },
    Finalize(FinalizeOptions),
    Reset,
}

impl ExecEvent {
    /// Convenience constructor for the highest-frequency event.
    pub fn node_token(id: impl Into<String>, text: impl Into<String>) -> Self {
        ExecEvent::NodeToken {
            id: id.into(),
            text: text.into(),
        }
    }

    pub fn node_start(
        id: impl Into<String>,
        label: impl Into<String>,
        kind: NodeKind,
    ) -> Self {
        ExecEvent::NodeStart {
            id: id.into(),
            label: label.into(),
            kind,
            model: None,
        }
    }

    pub fn node_finish(id: impl Into<String>, output: impl Into<String>) -> Self {
        ExecEvent::NodeFinish {
            id: id.into(),
            output: Some(output.into()),
        }
    }

    /// Short label used in logs and `Display` output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ExecEvent::NodeStart { .. } => "node_start",
            ExecEvent::NodeToken { .. } => "node_token",
            ExecEvent::NodeReasoning { .. } => "node_reasoning",
            ExecEvent::NodeFinish { .. } => "node_finish",
            ExecEvent::NodeError { .. } => "node_error",
            ExecEvent::RouteSelected { .. } => "route_selected",
            ExecEvent::TokenUsage { .. } => "token_usage",
            ExecEvent::BranchStart { .. } => "branch_start",
            ExecEvent::BranchToken { .. } => "branch_token",
            ExecEvent::BranchReasoning { .. } => "branch_reasoning",
            ExecEvent::BranchComplete { .. } => "branch_complete",
            ExecEvent::ToolCall(_) => "tool_call",
            ExecEvent::HitlRequest(_) => "hitl_request",
            ExecEvent::HitlResolve { .. } => "hitl_resolve",
            ExecEvent::WorkflowToken { .. } => "workflow_token",
            ExecEvent::Finalize(_) => "finalize",
            ExecEvent::Reset => "reset",
        }
    }
}

impl fmt::Display for ExecEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecEvent::NodeStart { id, label, .. } => write!(f, "node_start {id} ({label})"),
            ExecEvent::NodeToken { id, .. } => write!(f, "node_token {id}"),
            ExecEvent::NodeFinish { id, .. } => write!(f, "node_finish {id}"),
            ExecEvent::NodeError { id, error } => write!(f, "node_error {id}: {error}"),
            ExecEvent::BranchComplete {
                node_id, branch_id, ..
            } => write!(f, "branch_complete {node_id}:{branch_id}"),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// A tool-call lifecycle event, routed to the owning node or (when a
/// branch id accompanies it) to the owning branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallEvent {
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    /// Tool-call id; repeated events for the same id update in place.
    pub id: String,
    pub name: String,
    pub status: ToolCallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reviewer response delivered through `hitl_resolve`.
///
/// The one-shot channel carrying this back to the engine is held by the
/// calling collaborator (see [`crate::accumulator::HitlResponder`]); the
/// accumulator only ever sees the resolved object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitlResponse {
    pub action: HitlAction,
    /// Replacement or input payload, depending on the request mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl HitlResponse {
    pub fn approve() -> Self {
        Self {
            action: HitlAction::Approve,
            data: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            action: HitlAction::Reject,
            data: None,
        }
    }

    pub fn review(data: Value) -> Self {
        Self {
            action: HitlAction::Review,
            data: Some(data),
        }
    }
}

/// Options for the terminal `finalize` call.
///
/// The first `finalize` performs the full terminal transition; subsequent
/// calls only backfill still-empty metadata (see
/// [`StreamAccumulator::finalize`](crate::accumulator::StreamAccumulator::finalize)).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalizeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<FinalizeResult>,
    /// Workflow-level error; moves the tree to the `error` state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// User-requested stop; moves the tree to the `interrupted` state.
    #[serde(default)]
    pub stopped: bool,
}

impl FinalizeOptions {
    pub fn completed() -> Self {
        Self::default()
    }

    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            result: Some(FinalizeResult {
                output: Some(output.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn stopped() -> Self {
        Self {
            stopped: true,
            ..Default::default()
        }
    }
}

/// Summary metadata the engine may attach to `finalize`, possibly arriving
/// slightly after the terminal event in a second call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalizeResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_messages: Option<Vec<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Per-node output map, keyed by node id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_outputs: Option<rustc_hash::FxHashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_node_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tags() {
        let event = ExecEvent::node_token("n1", "hello");
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event"], "node_token");
        assert_eq!(json["id"], "n1");

        let parsed: ExecEvent = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_finalize_option_helpers() {
        assert!(FinalizeOptions::stopped().stopped);
        assert_eq!(
            FinalizeOptions::failed("boom").error.as_deref(),
            Some("boom")
        );
        let with_output = FinalizeOptions::with_output("done");
        assert_eq!(
            with_output.result.and_then(|r| r.output).as_deref(),
            Some("done")
        );
    }
}

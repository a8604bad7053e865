//! Core types for the streamloom accumulator.
//!
//! This module defines the status and kind enums shared by the whole state
//! tree: what a node *is* ([`NodeKind`]), where it is in its lifecycle
//! ([`NodeStatus`]), and where the workflow as a whole is
//! ([`ExecutionState`]). These are the domain vocabulary; the tree shapes
//! that carry them live in [`crate::state`].
//!
//! # Examples
//!
//! ```rust
//! use streamloom::types::{ExecutionState, NodeKind, NodeStatus};
//!
//! let kind = NodeKind::from("subflow");
//! assert!(kind.is_subflow());
//!
//! // Encode for persistence
//! assert_eq!(NodeKind::Router.encode(), "router");
//! assert_eq!(NodeKind::decode("router"), NodeKind::Router);
//!
//! assert!(!ExecutionState::Running.is_terminal());
//! assert!(ExecutionState::Interrupted.is_terminal());
//! assert!(NodeStatus::Error.is_terminal());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies what kind of work a node performs.
///
/// The execution engine reports a kind with every `node_start`; the
/// accumulator only interprets [`Subflow`](Self::Subflow) specially (it owns
/// a nested execution tree). Unknown kinds round-trip through
/// [`Custom`](Self::Custom) so new engine node types never break decoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Single LLM agent step.
    Agent,
    /// Fan-out node that owns parallel branches.
    Parallel,
    /// Conditional node that selects one outgoing route.
    Router,
    /// Direct tool invocation.
    Tool,
    /// Node that owns a nested workflow execution tree.
    Subflow,
    /// Human-in-the-loop checkpoint.
    Hitl,
    /// Engine-defined kind this crate has no special handling for.
    Custom(String),
}

impl NodeKind {
    /// Encode a kind into its persisted string form.
    ///
    /// ```rust
    /// # use streamloom::types::NodeKind;
    /// assert_eq!(NodeKind::Subflow.encode(), "subflow");
    /// assert_eq!(NodeKind::Custom("mapper".into()).encode(), "mapper");
    /// ```
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeKind::Agent => "agent".to_string(),
            NodeKind::Parallel => "parallel".to_string(),
            NodeKind::Router => "router".to_string(),
            NodeKind::Tool => "tool".to_string(),
            NodeKind::Subflow => "subflow".to_string(),
            NodeKind::Hitl => "hitl".to_string(),
            NodeKind::Custom(s) => s.clone(),
        }
    }

    /// Decode a persisted string form back into a kind.
    ///
    /// Unrecognized strings become [`Custom`](Self::Custom) for forward
    /// compatibility with newer engines.
    pub fn decode(s: &str) -> Self {
        match s {
            "agent" => NodeKind::Agent,
            "parallel" => NodeKind::Parallel,
            "router" => NodeKind::Router,
            "tool" => NodeKind::Tool,
            "subflow" => NodeKind::Subflow,
            "hitl" => NodeKind::Hitl,
            other => NodeKind::Custom(other.to_string()),
        }
    }

    /// Returns `true` if this node owns a nested execution tree.
    #[must_use]
    pub fn is_subflow(&self) -> bool {
        matches!(self, Self::Subflow)
    }

    /// Returns `true` if this node fans out into parallel branches.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        NodeKind::decode(s)
    }
}

/// Lifecycle status of a single node.
///
/// Transitions are append-only: a node never moves backward out of
/// [`Completed`](Self::Completed) or [`Error`](Self::Error), with the single
/// exception of a HITL resolution returning a [`Waiting`](Self::Waiting)
/// node to [`Active`](Self::Active).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Known to the tree but not started (placeholder entries).
    Pending,
    /// Currently executing.
    Active,
    /// Paused on a human-in-the-loop request.
    Waiting,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Error,
}

impl NodeStatus {
    /// Returns `true` for [`Completed`](Self::Completed) and
    /// [`Error`](Self::Error).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of a parallel branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Active,
    Completed,
}

/// Lifecycle status of a tool call inside a node or branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Active,
    Completed,
    Error,
}

impl ToolCallStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Overall execution state of one workflow tree.
///
/// Entered as [`Running`](Self::Running) at construction; the three other
/// states are terminal and reached through `finalize` (or, for nested
/// trees, through their owning node's finish/error).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Running,
    Completed,
    Error,
    Interrupted,
}

impl ExecutionState {
    /// Returns `true` once the tree has left [`Running`](Self::Running).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Interrupted => "interrupted",
        };
        write!(f, "{s}")
    }
}

/// How a human-in-the-loop checkpoint interacts with the reviewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlMode {
    /// Yes/no confirmation; resolving implies the node is done.
    Approval,
    /// Pick one option from the request's choice list; resolving implies
    /// the node is done.
    Choice,
    /// Free-form input fed back into the node.
    Input,
    /// Review and optionally replace the node's output.
    Review,
}

impl HitlMode {
    /// Whether resolving a request in this mode completes the node even
    /// when it has produced no output of its own.
    #[must_use]
    pub fn implies_completion(&self) -> bool {
        matches!(self, Self::Approval | Self::Choice)
    }
}

/// Reviewer action carried by a HITL response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlAction {
    Approve,
    Reject,
    Review,
    Input,
}

/// Token usage totals reported by the engine for one node or for the
/// whole run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsage {
    #[must_use]
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

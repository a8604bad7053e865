//! The recursive, versioned workflow state tree.
//!
//! One [`WorkflowTree`] is the root of an execution; every node of kind
//! [`NodeKind::Subflow`] owns exactly one nested tree through
//! [`NodeState::subflow`]: a strict tree with no cycles and no sharing.
//! Each tree carries a monotonic `version` counter so observers can detect
//! mutation by polling a single integer instead of deep-comparing the tree.
//!
//! All shapes here derive serde so a tree (or an exported snapshot of it)
//! can be persisted without a parallel set of wire types.
//!
//! # Examples
//!
//! ```rust
//! use streamloom::state::{NodeState, WorkflowTree};
//! use streamloom::types::{NodeKind, NodeStatus};
//!
//! let mut tree = WorkflowTree::new("wf-1", "Research pipeline");
//! tree.nodes.insert(
//!     "n1".to_string(),
//!     NodeState::started("Plan", NodeKind::Agent, None),
//! );
//! tree.execution_order.push("n1".to_string());
//! tree.bump();
//! assert_eq!(tree.version, 2);
//! assert_eq!(tree.nodes["n1"].status, NodeStatus::Active);
//! ```

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{
    BranchStatus, ExecutionState, HitlMode, NodeKind, NodeStatus, TokenUsage, ToolCallStatus,
};

/// One workflow execution tree: the root of a run, or the nested tree owned
/// by a subflow node.
///
/// The tree is mutated exclusively through
/// [`StreamAccumulator`](crate::accumulator::StreamAccumulator); external
/// callers read it through [`StreamAccumulator::tree`](crate::accumulator::StreamAccumulator::tree)
/// and react to `version` changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTree {
    /// Workflow identity.
    pub id: String,
    pub name: String,
    /// Where this tree is in its lifecycle.
    pub execution_state: ExecutionState,
    /// Node ids in the order they started.
    #[serde(default)]
    pub execution_order: Vec<String>,
    /// Node id -> node state.
    #[serde(default)]
    pub nodes: FxHashMap<String, NodeState>,
    /// Composite `"<nodeId>:<branchId>"` key -> branch state.
    #[serde(default)]
    pub branches: FxHashMap<String, BranchState>,
    /// Outstanding human-in-the-loop requests, keyed by request id.
    #[serde(default)]
    pub hitl_requests: FxHashMap<String, HitlRequestState>,
    /// The node currently executing, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
    /// The last node that ran (and produced output).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_node_id: Option<String>,
    /// Accumulated final output once the tree is terminal.
    #[serde(default)]
    pub final_output: String,
    /// In-progress workflow-level streaming buffer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_text: Option<String>,
    /// Monotonic change counter; bumped once per mutation of this subtree.
    pub version: u64,
    /// Tree-level error, if execution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The node whose error put this tree into the error state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_node_id: Option<String>,
}

impl WorkflowTree {
    /// Create a fresh tree in the `running` state at version 1.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            execution_state: ExecutionState::Running,
            execution_order: Vec::new(),
            nodes: FxHashMap::default(),
            branches: FxHashMap::default(),
            hitl_requests: FxHashMap::default(),
            current_node_id: None,
            last_active_node_id: None,
            final_output: String::new(),
            streaming_text: None,
            version: 1,
            error: None,
            failed_node_id: None,
        }
    }

    /// Placeholder tree for an ancestor subflow created on demand by the
    /// scoped-key resolver, before its real `node_start` has arrived.
    pub(crate) fn placeholder(id: &str) -> Self {
        Self::new(id, id)
    }

    /// Bump the version counter after a mutation of this subtree.
    pub fn bump(&mut self) {
        self.version += 1;
    }

    /// Composite key for a branch under this tree.
    #[must_use]
    pub fn branch_key(node_id: &str, branch_id: &str) -> String {
        format!("{node_id}:{branch_id}")
    }

    /// The committed output of the last node in execution order, if any.
    #[must_use]
    pub fn last_node_output(&self) -> Option<&str> {
        self.execution_order
            .last()
            .and_then(|id| self.nodes.get(id))
            .map(|node| node.output.as_str())
    }

    /// Ensure a subflow tree exists under `node_id`, creating a placeholder
    /// node entry and nested tree with neutral defaults when needed.
    ///
    /// This is the resolver side effect that lets token and branch events
    /// race ahead of their owning node's `node_start` without crashing; the
    /// real `node_start` repairs labels when it lands.
    pub(crate) fn ensure_subflow(&mut self, node_id: &str) -> &mut WorkflowTree {
        if !self.nodes.contains_key(node_id) {
            self.nodes
                .insert(node_id.to_string(), NodeState::placeholder(node_id));
            self.execution_order.push(node_id.to_string());
        }
        let node = self
            .nodes
            .get_mut(node_id)
            .expect("node inserted just above");
        node.subflow
            .get_or_insert_with(|| Box::new(WorkflowTree::placeholder(node_id)))
    }

    /// Fetch or create a node entry, adding placeholders to execution order.
    pub(crate) fn ensure_node(&mut self, node_id: &str) -> &mut NodeState {
        if !self.nodes.contains_key(node_id) {
            self.nodes
                .insert(node_id.to_string(), NodeState::placeholder(node_id));
            self.execution_order.push(node_id.to_string());
        }
        self.nodes.get_mut(node_id).expect("node inserted just above")
    }
}

/// State of one node within a tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub status: NodeStatus,
    /// Display label.
    pub label: String,
    pub kind: NodeKind,
    /// Model identifier for LLM-backed nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Committed output.
    #[serde(default)]
    pub output: String,
    /// In-progress streaming buffer; present only between start and
    /// flush/finish. Never retained in a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Coarse running estimate: one unit per token event, not per token.
    #[serde(default)]
    pub token_estimate: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Selected route id, for router nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_route: Option<String>,
    /// Engine-reported usage totals, when delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Tool calls made by this node, in start order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallState>,
    /// Nested execution tree; only for subflow nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subflow: Option<Box<WorkflowTree>>,
}

impl NodeState {
    /// A node that has just started executing.
    pub fn started(label: impl Into<String>, kind: NodeKind, model: Option<String>) -> Self {
        Self {
            status: NodeStatus::Active,
            label: label.into(),
            kind,
            model,
            output: String::new(),
            streaming_text: None,
            started_at: Some(Utc::now()),
            finished_at: None,
            token_estimate: 0,
            error: None,
            selected_route: None,
            usage: None,
            tool_calls: Vec::new(),
            subflow: None,
        }
    }

    /// Placeholder entry for a node referenced before its `node_start`.
    pub(crate) fn placeholder(id: &str) -> Self {
        Self {
            status: NodeStatus::Pending,
            label: id.to_string(),
            kind: NodeKind::Custom(String::new()),
            model: None,
            output: String::new(),
            streaming_text: None,
            started_at: None,
            finished_at: None,
            token_estimate: 0,
            error: None,
            selected_route: None,
            usage: None,
            tool_calls: Vec::new(),
            subflow: None,
        }
    }

    /// Upsert a tool call by id; repeated events update status in place.
    pub(crate) fn upsert_tool_call(&mut self, call: ToolCallUpdate) {
        upsert_tool_call(&mut self.tool_calls, call);
    }
}

/// State of one parallel branch, keyed by `"<nodeId>:<branchId>"` under its
/// owning tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchState {
    pub id: String,
    pub label: String,
    pub status: BranchStatus,
    /// Committed output. On completion, text actually streamed to the user
    /// wins over an engine-supplied final value.
    #[serde(default)]
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallState>,
}

impl BranchState {
    /// Reserved id of the synthetic branch that aggregates parallel results.
    pub const MERGE_ID: &'static str = "__merge__";
    /// Display label paired with [`MERGE_ID`](Self::MERGE_ID).
    pub const MERGE_LABEL: &'static str = "Merge";

    pub fn active(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            status: BranchStatus::Active,
            output: String::new(),
            streaming_text: None,
            tool_calls: Vec::new(),
        }
    }

    /// Whether this is the synthetic merge branch.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.id == Self::MERGE_ID
    }

    pub(crate) fn upsert_tool_call(&mut self, call: ToolCallUpdate) {
        upsert_tool_call(&mut self.tool_calls, call);
    }
}

/// State of one tool call inside a node or branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallState {
    pub id: String,
    pub name: String,
    pub status: ToolCallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// The fields of a tool-call event that reach the keyed upsert.
#[derive(Clone, Debug)]
pub(crate) struct ToolCallUpdate {
    pub id: String,
    pub name: String,
    pub status: ToolCallStatus,
    pub error: Option<String>,
}

fn upsert_tool_call(calls: &mut Vec<ToolCallState>, update: ToolCallUpdate) {
    if let Some(existing) = calls.iter_mut().find(|c| c.id == update.id) {
        existing.status = update.status;
        if update.error.is_some() {
            existing.error = update.error;
        }
        if update.status.is_terminal() && existing.finished_at.is_none() {
            existing.finished_at = Some(Utc::now());
        }
        return;
    }
    let now = Utc::now();
    calls.push(ToolCallState {
        id: update.id,
        name: update.name,
        status: update.status,
        error: update.error,
        started_at: Some(now),
        finished_at: update.status.is_terminal().then_some(now),
    });
}

/// A registered human-in-the-loop request.
///
/// Created by `hitl_request`, removed by `hitl_resolve` (matched by id
/// anywhere in the tree, including nested subflows) or force-rejected during
/// abnormal-termination cleanup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitlRequestState {
    pub id: String,
    /// Owning node id. Stored re-scoped to the local id of its tree.
    pub node_id: String,
    pub node_label: String,
    pub mode: HitlMode,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<HitlChoice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Engine input/output snapshot at the time of pause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HitlContext>,
}

/// One selectable option of a choice-mode request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitlChoice {
    pub id: String,
    pub label: String,
}

/// Engine context captured when a node paused for review.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HitlContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

//! The workflow execution stream accumulator.
//!
//! [`StreamAccumulator`] converts an unordered-arrival stream of execution
//! events into one consistent, versioned [`WorkflowTree`]. Three properties
//! drive the design:
//!
//! - **No ordering guarantee across entities**: events for concurrent
//!   branches and subflows may arrive in any interleaving. Addressing is
//!   handled by the scoped-key resolver ([`crate::scope`]), which creates
//!   placeholder ancestors on demand instead of failing.
//! - **Token batching**: high-frequency token events are buffered
//!   ([`batch::PendingTokens`]) and applied in one deferred flush, so the
//!   tree (and anyone polling its version) pays per flush, not per token.
//! - **Silent no-ops over errors**: unknown node/branch/tool ids are
//!   dropped, never raised; events legitimately race ahead of or behind
//!   their owning entity's lifecycle (see the error taxonomy notes on each
//!   mutator).
//!
//! All mutators run synchronously to completion; the accumulator never
//! suspends. The only deferred work is the application of already-buffered
//! tokens, and any terminal transition (`node_finish`, `node_error`,
//! `branch_complete`, `finalize`) forces a synchronous flush first so a
//! terminal state is never observed with a stale streaming buffer.
//!
//! # Example
//!
//! ```rust
//! use streamloom::accumulator::StreamAccumulator;
//! use streamloom::types::{NodeKind, NodeStatus};
//!
//! let mut acc = StreamAccumulator::new("wf-1", "Demo");
//! acc.node_start("n1", "Node", NodeKind::Agent, None);
//! acc.node_token("n1", "Hello");
//! acc.node_token("n1", " World");
//! acc.flush();
//! assert_eq!(
//!     acc.tree().nodes["n1"].streaming_text.as_deref(),
//!     Some("Hello World")
//! );
//!
//! acc.node_finish("n1", Some("Done".to_string()));
//! let node = &acc.tree().nodes["n1"];
//! assert_eq!(node.status, NodeStatus::Completed);
//! assert_eq!(node.output, "Done");
//! assert!(node.streaming_text.is_none());
//! ```

pub mod batch;
pub mod export;
mod hitl;

pub use hitl::HitlResponder;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::events::{ExecEvent, FinalizeOptions, ToolCallEvent};
use crate::message::Message;
use crate::observe::ChangeNotice;
use crate::scope::{self, ScopedId};
use crate::state::{BranchState, NodeState, ToolCallUpdate, WorkflowTree};
use crate::types::{ExecutionState, NodeKind, NodeStatus, BranchStatus, TokenUsage};

use batch::{FlushScheduler, PendingTokens};

/// Accumulates engine events into a versioned workflow state tree.
///
/// The tree is exclusively owned here; external callers read it through
/// [`tree`](Self::tree) and mutate only through the documented event
/// functions, which is what keeps the tree's invariants enforceable.
pub struct StreamAccumulator {
    tree: WorkflowTree,
    pending: PendingTokens,
    scheduler: FlushScheduler,
    finalized: bool,
    finalized_at: Option<DateTime<Utc>>,
    // Late-arriving summary metadata, merged by finalize.
    session_messages: Option<Vec<Message>>,
    usage: Option<TokenUsage>,
    node_outputs: Option<FxHashMap<String, String>>,
    final_node_id: Option<String>,
    notices: Option<flume::Sender<ChangeNotice>>,
}

impl StreamAccumulator {
    /// Create an accumulator for one workflow run, starting in the
    /// `running` state.
    pub fn new(workflow_id: impl Into<String>, workflow_name: impl Into<String>) -> Self {
        Self {
            tree: WorkflowTree::new(workflow_id, workflow_name),
            pending: PendingTokens::default(),
            scheduler: FlushScheduler::default(),
            finalized: false,
            finalized_at: None,
            session_messages: None,
            usage: None,
            node_outputs: None,
            final_node_id: None,
            notices: None,
        }
    }

    /// Attach a change-notice sender; every subtree version bump emits one
    /// [`ChangeNotice`] so observers can react without deep comparison.
    #[must_use]
    pub fn with_notifier(mut self, notices: flume::Sender<ChangeNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Read-only view of the live tree.
    #[must_use]
    pub fn tree(&self) -> &WorkflowTree {
        &self.tree
    }

    /// Root tree version; cheaper to poll than deep comparison.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.tree.version
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    #[must_use]
    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }

    /// Whether a deferred flush is waiting for the next tick boundary.
    #[must_use]
    pub fn has_scheduled_flush(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    /// Dispatch one engine event to its mutator.
    pub fn apply_event(&mut self, event: ExecEvent) {
        trace!(event = event.label(), "applying event");
        match event {
            ExecEvent::NodeStart {
                id,
                label,
                kind,
                model,
            } => self.node_start(&id, &label, kind, model),
            ExecEvent::NodeToken { id, text } | ExecEvent::NodeReasoning { id, text } => {
                self.node_token(&id, &text)
            }
            ExecEvent::NodeFinish { id, output } => self.node_finish(&id, output),
            ExecEvent::NodeError { id, error } => self.node_error(&id, &error),
            ExecEvent::RouteSelected { id, route } => self.route_selected(&id, &route),
            ExecEvent::TokenUsage { id, usage } => self.token_usage(&id, usage),
            ExecEvent::BranchStart {
                node_id,
                branch_id,
                label,
            } => self.branch_start(&node_id, &branch_id, &label),
            ExecEvent::BranchToken {
                node_id,
                branch_id,
                text,
                ..
            }
            | ExecEvent::BranchReasoning {
                node_id,
                branch_id,
                text,
                ..
            } => self.branch_token(&node_id, &branch_id, &text),
            ExecEvent::BranchComplete {
                node_id,
                branch_id,
                label,
                output,
            } => self.branch_complete(&node_id, &branch_id, &label, output),
            ExecEvent::ToolCall(call) => self.tool_call_event(call),
            ExecEvent::HitlRequest(request) => self.hitl_request(request),
            ExecEvent::HitlResolve {
                request_id,
                response,
            } => self.hitl_resolve(&request_id, response),
            ExecEvent::WorkflowToken { text, meta } => self.workflow_token(&text, meta),
            ExecEvent::Finalize(options) => self.finalize(options),
            ExecEvent::Reset => self.reset(),
        }
    }

    // ------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------

    /// Register a node start. Idempotent re-entry: a duplicate start for
    /// the same id overwrites label/kind/model (last write wins) while
    /// preserving timestamps already recorded.
    pub fn node_start(
        &mut self,
        id: &str,
        label: &str,
        kind: NodeKind,
        model: Option<String>,
    ) {
        if self.finalized {
            trace!(node = id, "node_start dropped after finalize");
            return;
        }
        let scoped = ScopedId::parse(id);
        let is_subflow = kind.is_subflow();
        let tree = scope::resolve_tree_mut(&mut self.tree, &scoped.path);

        match tree.nodes.get_mut(&scoped.local) {
            Some(node) => {
                node.label = label.to_string();
                node.kind = kind;
                node.model = model;
                if node.started_at.is_none() {
                    node.started_at = Some(Utc::now());
                }
                if !node.status.is_terminal() {
                    node.status = NodeStatus::Active;
                }
            }
            None => {
                tree.nodes
                    .insert(scoped.local.clone(), NodeState::started(label, kind, model));
            }
        }
        if !tree.execution_order.iter().any(|n| n == &scoped.local) {
            tree.execution_order.push(scoped.local.clone());
        }
        tree.current_node_id = Some(scoped.local.clone());
        tree.last_active_node_id = Some(scoped.local.clone());

        if is_subflow {
            if let Some(node) = tree.nodes.get_mut(&scoped.local) {
                let sub = node.subflow.get_or_insert_with(|| {
                    Box::new(WorkflowTree::new(scoped.local.clone(), label.to_string()))
                });
                // Repair placeholder metadata left by racing events.
                sub.name = label.to_string();
            }
        }
        self.touch(&scoped.path);
    }

    /// Buffer streamed token text for a node. Reasoning text lands in the
    /// same buffer; it is not tracked separately. Empty text and
    /// post-finalize tokens are ignored.
    pub fn node_token(&mut self, id: &str, text: &str) {
        if self.finalized || text.is_empty() {
            return;
        }
        self.pending.push_node(id, text.to_string());
        self.scheduler.request();
    }

    /// Complete a node: force-flush, commit output, clear the streaming
    /// buffer, and finalize any nested subflow tree.
    pub fn node_finish(&mut self, id: &str, output: Option<String>) {
        if self.finalized {
            return;
        }
        self.flush();
        let scoped = ScopedId::parse(id);
        let tree = scope::resolve_tree_mut(&mut self.tree, &scoped.path);
        let Some(node) = tree.nodes.get_mut(&scoped.local) else {
            trace!(node = id, "node_finish for unknown node");
            return;
        };
        let streamed = node.streaming_text.take().filter(|s| !s.is_empty());
        node.output = output.filter(|s| !s.is_empty()).or(streamed).unwrap_or_default();
        node.status = NodeStatus::Completed;
        node.finished_at = Some(Utc::now());
        if let Some(sub) = node.subflow.as_deref_mut() {
            finalize_subtree(sub);
        }
        if tree.current_node_id.as_deref() == Some(scoped.local.as_str()) {
            tree.current_node_id = None;
        }
        tree.last_active_node_id = Some(scoped.local.clone());
        self.touch(&scoped.path);
    }

    /// Record a node failure. The owning tree's execution state moves to
    /// `error` and its failed-node id is recorded; streamed text is
    /// committed as output so it stays inspectable while the terminal
    /// no-streaming-buffer invariant holds.
    pub fn node_error(&mut self, id: &str, error: &str) {
        if self.finalized {
            return;
        }
        self.flush();
        let scoped = ScopedId::parse(id);
        let tree = scope::resolve_tree_mut(&mut self.tree, &scoped.path);
        let Some(node) = tree.nodes.get_mut(&scoped.local) else {
            trace!(node = id, "node_error for unknown node");
            return;
        };
        node.status = NodeStatus::Error;
        node.error = Some(error.to_string());
        node.finished_at = Some(Utc::now());
        if let Some(streamed) = node.streaming_text.take() {
            if node.output.is_empty() {
                node.output = streamed;
            }
        }
        tree.execution_state = ExecutionState::Error;
        tree.error = Some(error.to_string());
        tree.failed_node_id = Some(scoped.local.clone());
        if tree.current_node_id.as_deref() == Some(scoped.local.as_str()) {
            tree.current_node_id = None;
        }
        self.touch(&scoped.path);

        // Resume derivation reads the failed node off the root; keep the
        // full scoped id there when the failure happened in a subflow.
        if scoped.is_scoped() && self.tree.failed_node_id.is_none() {
            self.tree.failed_node_id = Some(id.to_string());
            self.touch(&[]);
        }
    }

    /// Attach a selected route to an existing router node. No-op against
    /// an unknown node id.
    pub fn route_selected(&mut self, id: &str, route: &str) {
        if self.finalized {
            return;
        }
        let scoped = ScopedId::parse(id);
        let Some(tree) = scope::resolve_tree_existing_mut(&mut self.tree, &scoped.path) else {
            return;
        };
        let Some(node) = tree.nodes.get_mut(&scoped.local) else {
            trace!(node = id, "route_selected for unknown node");
            return;
        };
        node.selected_route = Some(route.to_string());
        self.touch(&scoped.path);
    }

    /// Attach engine-reported usage totals to an existing node. No-op
    /// against an unknown node id.
    pub fn token_usage(&mut self, id: &str, usage: TokenUsage) {
        if self.finalized {
            return;
        }
        let scoped = ScopedId::parse(id);
        let Some(tree) = scope::resolve_tree_existing_mut(&mut self.tree, &scoped.path) else {
            return;
        };
        let Some(node) = tree.nodes.get_mut(&scoped.local) else {
            trace!(node = id, "token_usage for unknown node");
            return;
        };
        node.usage = Some(usage);
        self.touch(&scoped.path);
    }

    // ------------------------------------------------------------------
    // Branch lifecycle
    // ------------------------------------------------------------------

    /// Open a branch under an already-started node. A start against a
    /// non-existent owning node is a silent no-op (ordering guard, not an
    /// error).
    pub fn branch_start(&mut self, node_id: &str, branch_id: &str, label: &str) {
        if self.finalized {
            return;
        }
        let scoped = ScopedId::parse(node_id);
        let Some(tree) = scope::resolve_tree_existing_mut(&mut self.tree, &scoped.path) else {
            return;
        };
        if !tree.nodes.contains_key(&scoped.local) {
            trace!(node = node_id, branch = branch_id, "branch_start before owner");
            return;
        }
        let key = WorkflowTree::branch_key(&scoped.local, branch_id);
        tree.branches
            .entry(key)
            .and_modify(|b| b.label = label.to_string())
            .or_insert_with(|| BranchState::active(branch_id, label));
        self.touch(&scoped.path);
    }

    /// Buffer streamed token text for a branch, keyed by the composite
    /// branch key. Semantics mirror [`node_token`](Self::node_token).
    pub fn branch_token(&mut self, node_id: &str, branch_id: &str, text: &str) {
        if self.finalized || text.is_empty() {
            return;
        }
        self.pending.push_branch(node_id, branch_id, text.to_string());
        self.scheduler.request();
    }

    /// Complete a branch. Text actually streamed wins over the
    /// engine-supplied output; with nothing streamed the supplied output is
    /// used, else empty.
    pub fn branch_complete(
        &mut self,
        node_id: &str,
        branch_id: &str,
        label: &str,
        output: Option<String>,
    ) {
        if self.finalized {
            return;
        }
        self.flush();
        let scoped = ScopedId::parse(node_id);
        let Some(tree) = scope::resolve_tree_existing_mut(&mut self.tree, &scoped.path) else {
            return;
        };
        let key = WorkflowTree::branch_key(&scoped.local, branch_id);
        if !tree.branches.contains_key(&key) {
            if !tree.nodes.contains_key(&scoped.local) {
                trace!(node = node_id, branch = branch_id, "branch_complete before owner");
                return;
            }
            tree.branches
                .insert(key.clone(), BranchState::active(branch_id, label));
        }
        let Some(branch) = tree.branches.get_mut(&key) else {
            return;
        };
        let streamed = branch.streaming_text.take().filter(|s| !s.is_empty());
        branch.output = streamed.or(output).unwrap_or_default();
        branch.status = BranchStatus::Completed;
        self.touch(&scoped.path);
    }

    // ------------------------------------------------------------------
    // Tool calls & workflow-level tokens
    // ------------------------------------------------------------------

    /// Upsert a tool call on its owning node or branch. Unknown owners are
    /// silent no-ops.
    pub fn tool_call_event(&mut self, event: ToolCallEvent) {
        if self.finalized {
            return;
        }
        let scoped = ScopedId::parse(&event.node_id);
        let Some(tree) = scope::resolve_tree_existing_mut(&mut self.tree, &scoped.path) else {
            return;
        };
        let update = ToolCallUpdate {
            id: event.id,
            name: event.name,
            status: event.status,
            error: event.error,
        };
        match event.branch_id {
            Some(branch_id) => {
                let key = WorkflowTree::branch_key(&scoped.local, &branch_id);
                let Some(branch) = tree.branches.get_mut(&key) else {
                    trace!(key = %key, "tool call for unknown branch");
                    return;
                };
                branch.upsert_tool_call(update);
            }
            None => {
                let Some(node) = tree.nodes.get_mut(&scoped.local) else {
                    trace!(node = %event.node_id, "tool call for unknown node");
                    return;
                };
                node.upsert_tool_call(update);
            }
        }
        self.touch(&scoped.path);
    }

    /// Buffer workflow-level token text (the run's own narration stream).
    pub fn workflow_token(&mut self, text: &str, _meta: Option<Value>) {
        if self.finalized || text.is_empty() {
            return;
        }
        self.pending.push_workflow(text.to_string());
        self.scheduler.request();
    }

    // ------------------------------------------------------------------
    // Flush
    // ------------------------------------------------------------------

    /// Apply all buffered tokens: concatenate each buffer in arrival
    /// order, append to the owning entity's streaming buffer, add one
    /// coarse token-count unit per token event, and bump each touched
    /// subtree's version exactly once.
    pub fn flush(&mut self) {
        self.scheduler.clear();
        if self.pending.is_empty() {
            return;
        }
        let PendingTokens {
            nodes,
            branches,
            workflow,
        } = self.pending.take();
        let mut touched: Vec<Vec<String>> = Vec::new();

        for (raw, tokens) in nodes {
            let scoped = ScopedId::parse(&raw);
            let tree = scope::resolve_tree_mut(&mut self.tree, &scoped.path);
            let node = tree.ensure_node(&scoped.local);
            let buffer = node.streaming_text.get_or_insert_with(String::new);
            for token in &tokens {
                buffer.push_str(token);
            }
            node.token_estimate += tokens.len() as u64;
            if !touched.contains(&scoped.path) {
                touched.push(scoped.path);
            }
        }

        for ((raw_node, branch_id), tokens) in branches {
            let scoped = ScopedId::parse(&raw_node);
            let tree = scope::resolve_tree_mut(&mut self.tree, &scoped.path);
            let key = WorkflowTree::branch_key(&scoped.local, &branch_id);
            if !tree.branches.contains_key(&key) {
                if !tree.nodes.contains_key(&scoped.local) {
                    trace!(node = %raw_node, branch = %branch_id, "dropping tokens for unknown branch owner");
                    continue;
                }
                tree.branches
                    .insert(key.clone(), BranchState::active(&branch_id, &branch_id));
            }
            if let Some(branch) = tree.branches.get_mut(&key) {
                let buffer = branch.streaming_text.get_or_insert_with(String::new);
                for token in &tokens {
                    buffer.push_str(token);
                }
            }
            if !touched.contains(&scoped.path) {
                touched.push(scoped.path);
            }
        }

        if !workflow.is_empty() {
            let buffer = self.tree.streaming_text.get_or_insert_with(String::new);
            for token in &workflow {
                buffer.push_str(token);
            }
            let root: Vec<String> = Vec::new();
            if !touched.contains(&root) {
                touched.push(root);
            }
        }

        debug!(subtrees = touched.len(), "flushed pending tokens");
        for path in touched {
            self.touch(&path);
        }
    }

    // ------------------------------------------------------------------
    // Finalize & reset
    // ------------------------------------------------------------------

    /// Terminal transition for the run.
    ///
    /// The first call force-flushes, moves the tree to its terminal state
    /// (`completed`, `error`, or `interrupted`), derives the final output
    /// (explicit result output, then accumulated workflow streaming text,
    /// then the last node's committed output, then empty), records summary
    /// metadata, and force-rejects outstanding HITL requests on abnormal
    /// termination. After that the accumulator is frozen: every subsequent
    /// call is a narrow metadata merge that only backfills still-empty
    /// fields and never re-triggers the transition; summary metadata can
    /// legitimately arrive slightly after the terminal event.
    pub fn finalize(&mut self, options: FinalizeOptions) {
        if self.finalized {
            self.merge_late_metadata(options);
            return;
        }
        self.flush();
        self.finalized = true;
        self.finalized_at = Some(Utc::now());

        let FinalizeOptions {
            result,
            error,
            stopped,
        } = options;
        // A node error has already moved the tree to its terminal error
        // state; a plain finalize must not undo that transition.
        let already_failed = self.tree.execution_state == ExecutionState::Error;
        let abnormal = error.is_some() || stopped || already_failed;
        if let Some(err) = error {
            self.tree.execution_state = ExecutionState::Error;
            self.tree.error = Some(err);
        } else if stopped && !already_failed {
            self.tree.execution_state = ExecutionState::Interrupted;
        } else if !already_failed {
            self.tree.execution_state = ExecutionState::Completed;
        }

        let result = result.unwrap_or_default();
        let streamed = self.tree.streaming_text.take().filter(|s| !s.is_empty());
        let last_output = self
            .tree
            .last_node_output()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self.tree.final_output = result
            .output
            .clone()
            .filter(|s| !s.is_empty())
            .or(streamed)
            .or(last_output)
            .unwrap_or_default();

        self.session_messages = result.session_messages;
        self.usage = result.usage;
        self.node_outputs = result.node_outputs;
        self.final_node_id = result.final_node_id;
        if let Some(order) = result.execution_order {
            if self.tree.execution_order.is_empty() {
                self.tree.execution_order = order;
            }
        }
        if let Some(last) = result.last_node_id {
            self.tree.last_active_node_id = Some(last);
        }

        if abnormal {
            hitl::force_reject_outstanding(&mut self.tree);
        }
        self.pending.clear();
        self.scheduler.clear();
        debug!(state = %self.tree.execution_state, "workflow finalized");
        self.touch(&[]);
    }

    /// Backfill path for finalize calls after the terminal transition.
    fn merge_late_metadata(&mut self, options: FinalizeOptions) {
        let Some(result) = options.result else {
            trace!("post-finalize call with no result metadata dropped");
            return;
        };
        let mut changed = false;
        if self.session_messages.is_none() {
            if let Some(messages) = result.session_messages {
                self.session_messages = Some(messages);
                changed = true;
            }
        }
        if self.usage.is_none() {
            if let Some(usage) = result.usage {
                self.usage = Some(usage);
                changed = true;
            }
        }
        if self.node_outputs.is_none() {
            if let Some(outputs) = result.node_outputs {
                self.node_outputs = Some(outputs);
                changed = true;
            }
        }
        if self.tree.execution_order.is_empty() {
            if let Some(order) = result.execution_order {
                self.tree.execution_order = order;
                changed = true;
            }
        }
        if self.tree.last_active_node_id.is_none() {
            if let Some(last) = result.last_node_id {
                self.tree.last_active_node_id = Some(last);
                changed = true;
            }
        }
        if self.final_node_id.is_none() {
            if let Some(final_node) = result.final_node_id {
                self.final_node_id = Some(final_node);
                changed = true;
            }
        }
        if self.tree.final_output.is_empty() {
            if let Some(output) = result.output {
                self.tree.final_output = output;
                changed = true;
            }
        }
        if changed {
            self.touch(&[]);
        }
    }

    /// Drop all accumulated state and pending buffers, keeping workflow
    /// identity. The version counter stays monotonic across the reset so
    /// observers still see it move.
    pub fn reset(&mut self) {
        let version = self.tree.version;
        let mut fresh = WorkflowTree::new(self.tree.id.clone(), self.tree.name.clone());
        fresh.version = version + 1;
        self.tree = fresh;
        self.pending.clear();
        self.scheduler.clear();
        self.finalized = false;
        self.finalized_at = None;
        self.session_messages = None;
        self.usage = None;
        self.node_outputs = None;
        self.final_node_id = None;
        self.notify("root", version + 1);
    }

    // ------------------------------------------------------------------
    // Versioning & change propagation
    // ------------------------------------------------------------------

    /// Bump the version of the subtree at `path` and notify observers.
    fn touch(&mut self, path: &[String]) {
        let tree = scope::resolve_tree_mut(&mut self.tree, path);
        tree.bump();
        let version = tree.version;
        self.notify(&scope::scope_label(path), version);
    }

    fn notify(&self, scope: &str, version: u64) {
        if let Some(notices) = &self.notices {
            let notice = ChangeNotice::new(scope, version);
            if notices.send(notice).is_err() {
                trace!(scope, "change observer disconnected");
            }
        }
    }
}

/// Finalize a nested subflow tree when its owning node finishes: move a
/// still-running tree to `completed`, promote streamed text into the final
/// output when no explicit output exists, and clear streaming buffers so
/// the terminal invariant holds recursively.
fn finalize_subtree(tree: &mut WorkflowTree) {
    if tree.execution_state == ExecutionState::Running {
        tree.execution_state = ExecutionState::Completed;
    }
    if tree.final_output.is_empty() {
        let streamed = tree.streaming_text.take().filter(|s| !s.is_empty());
        let last_output = tree
            .last_node_output()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if let Some(output) = streamed.or(last_output) {
            tree.final_output = output;
        }
    }
    tree.streaming_text = None;
    for node in tree.nodes.values_mut() {
        if let Some(sub) = node.subflow.as_deref_mut() {
            finalize_subtree(sub);
        }
        if node.status.is_terminal() {
            node.streaming_text = None;
        }
    }
    tree.bump();
}

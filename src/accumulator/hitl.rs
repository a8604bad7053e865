//! Human-in-the-loop request registration and resolution.
//!
//! A `hitl_request` parks its owning node in the `waiting` status and
//! registers the request with the tree the node lives in. Resolution is
//! matched by request id alone (the reviewer's response does not carry a
//! scope), so `hitl_resolve` searches the root tree and every nested
//! subflow tree for the id. Abnormal termination force-rejects whatever is
//! still outstanding so no request object survives a dead run.

use chrono::Utc;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::trace;

use crate::events::HitlResponse;
use crate::scope::{self, ScopedId};
use crate::state::{HitlRequestState, WorkflowTree};
use crate::types::{HitlAction, NodeStatus};

use super::StreamAccumulator;

/// Error text recorded on a node whose request the reviewer rejected.
pub(crate) const REJECTED_MESSAGE: &str = "Rejected by reviewer";
/// Error text recorded when termination cleanup rejects a request that
/// never received a response.
pub(crate) const CANCELLED_MESSAGE: &str = "Cancelled before response";

impl StreamAccumulator {
    /// Register a human-in-the-loop request and park its owning node in
    /// the `waiting` status. The node is created as a placeholder if the
    /// request arrives before its `node_start`.
    pub fn hitl_request(&mut self, mut request: HitlRequestState) {
        if self.is_finalized() {
            trace!(request = %request.id, "hitl_request dropped after finalize");
            return;
        }
        let scoped = ScopedId::parse(&request.node_id);
        // The request lives in the owning tree, so it stores the local id.
        request.node_id = scoped.local.clone();
        let tree = scope::resolve_tree_mut(&mut self.tree, &scoped.path);
        let node = tree.ensure_node(&scoped.local);
        if node.label == scoped.local && !request.node_label.is_empty() {
            node.label = request.node_label.clone();
        }
        // Only a node already in error is exempt from the waiting
        // transition; a completed node can be pulled back for review.
        if node.status != NodeStatus::Error {
            node.status = NodeStatus::Waiting;
        }
        tree.hitl_requests.insert(request.id.clone(), request);
        self.touch(&scoped.path);
    }

    /// Resolve a request by id, wherever in the tree it is registered.
    ///
    /// - `reject` marks the node failed with [`REJECTED_MESSAGE`].
    /// - `review` with replacement data overwrites the node's output.
    /// - Any other resolution completes the node if it already has output,
    ///   has already finished, or the request mode implies completion;
    ///   otherwise the node returns to `active` (input flows back into a
    ///   still-running node).
    ///
    /// Unknown request ids are silent no-ops: the request may already have
    /// been force-rejected or resolved through another path.
    pub fn hitl_resolve(&mut self, request_id: &str, response: Option<HitlResponse>) {
        if self.is_finalized() {
            trace!(request = request_id, "hitl_resolve dropped after finalize");
            return;
        }
        let found = resolve_request_in(&mut self.tree, Vec::new(), request_id, response.as_ref());
        match found {
            Some(path) => self.touch(&path),
            None => trace!(request = request_id, "hitl_resolve for unknown request"),
        }
    }
}

/// Depth-first search for the tree holding `request_id`; applies the
/// resolution there and returns the owning subtree path.
fn resolve_request_in(
    tree: &mut WorkflowTree,
    path: Vec<String>,
    request_id: &str,
    response: Option<&HitlResponse>,
) -> Option<Vec<String>> {
    if let Some(request) = tree.hitl_requests.remove(request_id) {
        apply_resolution(tree, &request, response);
        return Some(path);
    }
    let subflow_owners: Vec<String> = tree
        .nodes
        .iter()
        .filter(|(_, node)| node.subflow.is_some())
        .map(|(id, _)| id.clone())
        .collect();
    for owner in subflow_owners {
        let Some(sub) = tree
            .nodes
            .get_mut(&owner)
            .and_then(|node| node.subflow.as_deref_mut())
        else {
            continue;
        };
        let mut child_path = path.clone();
        child_path.push(owner);
        if let Some(found) = resolve_request_in(sub, child_path, request_id, response) {
            return Some(found);
        }
    }
    None
}

fn apply_resolution(
    tree: &mut WorkflowTree,
    request: &HitlRequestState,
    response: Option<&HitlResponse>,
) {
    let Some(node) = tree.nodes.get_mut(&request.node_id) else {
        return;
    };
    match response.map(|r| r.action) {
        Some(HitlAction::Reject) => {
            node.status = NodeStatus::Error;
            node.error = Some(REJECTED_MESSAGE.to_string());
            node.finished_at = Some(Utc::now());
            if let Some(streamed) = node.streaming_text.take() {
                if node.output.is_empty() {
                    node.output = streamed;
                }
            }
        }
        action => {
            if action == Some(HitlAction::Review) {
                if let Some(data) = response.and_then(|r| r.data.as_ref()) {
                    node.output = value_to_text(data);
                }
            }
            let completes = !node.output.is_empty()
                || node.finished_at.is_some()
                || request.mode.implies_completion();
            if completes {
                node.status = NodeStatus::Completed;
                node.streaming_text = None;
                if node.finished_at.is_none() {
                    node.finished_at = Some(Utc::now());
                }
            } else {
                node.status = NodeStatus::Active;
            }
        }
    }
}

/// Reject every outstanding request in `tree` and its nested subflows.
/// Abnormal-termination cleanup: a dead run answers no reviewer.
pub(super) fn force_reject_outstanding(tree: &mut WorkflowTree) {
    let outstanding: Vec<HitlRequestState> = tree.hitl_requests.drain().map(|(_, r)| r).collect();
    let changed = !outstanding.is_empty();
    for request in outstanding {
        if let Some(node) = tree.nodes.get_mut(&request.node_id) {
            if node.status == NodeStatus::Waiting {
                node.status = NodeStatus::Error;
                node.error = Some(CANCELLED_MESSAGE.to_string());
                node.finished_at = Some(Utc::now());
            }
        }
    }
    for node in tree.nodes.values_mut() {
        if let Some(sub) = node.subflow.as_deref_mut() {
            force_reject_outstanding(sub);
        }
    }
    if changed {
        tree.bump();
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One-shot reply channel handed to the engine alongside a HITL request,
/// so the resolving collaborator can deliver the reviewer's response back
/// to the paused node.
#[derive(Debug)]
pub struct HitlResponder {
    tx: oneshot::Sender<HitlResponse>,
}

impl HitlResponder {
    /// Create a responder/receiver pair for one request.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<HitlResponse>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Deliver the response, consuming the responder. Returns the response
    /// back if the waiting side has already gone away.
    pub fn respond(self, response: HitlResponse) -> Result<(), HitlResponse> {
        self.tx.send(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::HitlResponse;

    #[tokio::test]
    async fn test_responder_round_trip() {
        let (responder, rx) = HitlResponder::channel();
        responder.respond(HitlResponse::approve()).expect("send");
        let response = rx.await.expect("receive");
        assert_eq!(response.action, HitlAction::Approve);
    }

    #[test]
    fn test_responder_reports_dropped_receiver() {
        let (responder, rx) = HitlResponder::channel();
        drop(rx);
        let err = responder.respond(HitlResponse::reject());
        assert!(err.is_err());
    }
}

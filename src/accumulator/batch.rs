//! Token batching primitives: pending buffers and the single-flight
//! flush scheduler.
//!
//! High-frequency token events never touch the tree directly. They are
//! appended to transient buffers here and applied in one pass by
//! [`StreamAccumulator::flush`](super::StreamAccumulator::flush), so a
//! thousand token events between two flush points cost the tree one
//! mutation and one version bump per touched subtree.

use rustc_hash::FxHashMap;

/// Transient, not-yet-applied token text.
///
/// Keys preserve the raw scoped id so buffered tokens resolve to the right
/// subtree at flush time, even when the owning subflow tree did not exist
/// when the token arrived. Not part of the durable tree: cleared on every
/// flush and dropped wholesale by `reset`.
#[derive(Clone, Debug, Default)]
pub struct PendingTokens {
    /// Raw scoped node id -> tokens in arrival order.
    pub(crate) nodes: FxHashMap<String, Vec<String>>,
    /// (raw scoped node id, branch id) -> tokens in arrival order.
    pub(crate) branches: FxHashMap<(String, String), Vec<String>>,
    /// Workflow-level tokens in arrival order.
    pub(crate) workflow: Vec<String>,
}

impl PendingTokens {
    pub fn push_node(&mut self, raw_id: &str, text: String) {
        self.nodes.entry(raw_id.to_string()).or_default().push(text);
    }

    pub fn push_branch(&mut self, raw_node_id: &str, branch_id: &str, text: String) {
        self.branches
            .entry((raw_node_id.to_string(), branch_id.to_string()))
            .or_default()
            .push(text);
    }

    pub fn push_workflow(&mut self, text: String) {
        self.workflow.push(text);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.branches.is_empty() && self.workflow.is_empty()
    }

    /// Drain everything buffered, leaving the buffers empty.
    #[must_use]
    pub fn take(&mut self) -> PendingTokens {
        std::mem::take(self)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.branches.clear();
        self.workflow.clear();
    }
}

/// Single-flight flush scheduling.
///
/// `request` while a flush is already pending is a no-op; the driver
/// applies the flush at the next tick boundary, and any terminal
/// transition drains synchronously ahead of it.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlushScheduler {
    scheduled: bool,
    requested_total: u64,
    flushed_total: u64,
}

impl FlushScheduler {
    /// Request a deferred flush. Returns `true` only when this call newly
    /// scheduled one.
    pub fn request(&mut self) -> bool {
        self.requested_total += 1;
        if self.scheduled {
            return false;
        }
        self.scheduled = true;
        true
    }

    /// Mark the scheduled flush as run (or pre-empted by a forced drain).
    pub fn clear(&mut self) {
        if self.scheduled {
            self.flushed_total += 1;
        }
        self.scheduled = false;
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// How many schedule requests have been made (including coalesced ones).
    #[must_use]
    pub fn requested_total(&self) -> u64 {
        self.requested_total
    }

    /// How many scheduled flushes actually ran.
    #[must_use]
    pub fn flushed_total(&self) -> u64 {
        self.flushed_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_single_flight() {
        let mut scheduler = FlushScheduler::default();
        assert!(scheduler.request());
        assert!(!scheduler.request());
        assert!(!scheduler.request());
        assert!(scheduler.is_scheduled());

        scheduler.clear();
        assert!(!scheduler.is_scheduled());
        assert_eq!(scheduler.requested_total(), 3);
        assert_eq!(scheduler.flushed_total(), 1);

        assert!(scheduler.request());
    }

    #[test]
    fn test_pending_take_leaves_empty_buffers() {
        let mut pending = PendingTokens::default();
        pending.push_node("n1", "a".into());
        pending.push_branch("p1", "x", "b".into());
        pending.push_workflow("c".into());
        assert!(!pending.is_empty());

        let taken = pending.take();
        assert!(pending.is_empty());
        assert_eq!(taken.nodes["n1"], vec!["a".to_string()]);
        assert_eq!(
            taken.branches[&("p1".to_string(), "x".to_string())],
            vec!["b".to_string()]
        );
        assert_eq!(taken.workflow, vec!["c".to_string()]);
    }
}

//! Change observation: notices, sinks, and the broadcast hub.
//!
//! Observers never diff the tree. Every subtree version bump produces one
//! [`ChangeNotice`] naming the touched scope and its new version; a
//! [`ChangeHub`] fans those notices out to any number of [`NoticeSink`]s
//! from a background listener task. A UI polls versions, a logger prints
//! lines, a test captures them in memory, all through the same seam.

mod hub;
mod sink;

pub use hub::ChangeHub;
pub use sink::{ChannelSink, MemorySink, NoticeSink, StdOutSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One "this subtree changed" signal.
///
/// `scope` is the observer-facing subtree label (`"root"` for the root
/// tree, `"@outer/@inner"` for a nested one); `version` is the subtree's
/// counter after the bump. Carrying the version in the notice lets an
/// observer drop stale notices without touching the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub scope: String,
    pub version: u64,
    pub at: DateTime<Utc>,
}

impl ChangeNotice {
    pub fn new(scope: impl Into<String>, version: u64) -> Self {
        Self {
            scope: scope.into(),
            version,
            at: Utc::now(),
        }
    }
}

impl std::fmt::Display for ChangeNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{}", self.scope, self.version)
    }
}

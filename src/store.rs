//! Persistence seam for exported workflow snapshots.
//!
//! The accumulator itself never performs I/O; the persistence collaborator
//! takes [`WorkflowMessageData`] snapshots and stores them behind the
//! [`MessageStore`] trait. [`InMemoryMessageStore`] is the reference
//! backend, storing snapshots in their JSON string form so every save and
//! load exercises the same serialization path a durable backend would.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::accumulator::export::WorkflowMessageData;
use crate::utils::json_ext::JsonSerializable;

/// Errors surfaced by snapshot persistence backends.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("JSON serialization/deserialization failed: {source}")]
    #[diagnostic(
        code(streamloom::store::serde),
        help("the stored payload does not match the WorkflowMessageData shape")
    )]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    #[error("store backend error: {0}")]
    #[diagnostic(code(streamloom::store::backend))]
    Backend(String),
}

/// Blanket JSON-string serialization for all suitable types using StoreError.
impl<T> JsonSerializable<StoreError> for T
where
    T: serde::Serialize + for<'de> serde::de::DeserializeOwned,
{
    fn to_json_string(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(|e| StoreError::Serde { source: e })
    }

    fn from_json_str(s: &str) -> Result<Self, StoreError> {
        serde_json::from_str(s).map_err(|e| StoreError::Serde { source: e })
    }
}

/// Storage backend for workflow message snapshots, keyed by workflow id.
/// Saving again under the same id replaces the previous snapshot.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save(&self, data: &WorkflowMessageData) -> Result<(), StoreError>;

    /// Load the latest snapshot for a workflow; `Ok(None)` when nothing
    /// has been saved under that id.
    async fn load(&self, workflow_id: &str) -> Result<Option<WorkflowMessageData>, StoreError>;
}

/// In-memory backend for tests and single-process embedding.
#[derive(Default)]
pub struct InMemoryMessageStore {
    entries: RwLock<FxHashMap<String, String>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of all workflows with a stored snapshot.
    pub async fn saved_ids(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save(&self, data: &WorkflowMessageData) -> Result<(), StoreError> {
        let serialized = data.to_json_string()?;
        self.entries
            .write()
            .await
            .insert(data.workflow_id.clone(), serialized);
        debug!(workflow = %data.workflow_id, "snapshot saved");
        Ok(())
    }

    async fn load(&self, workflow_id: &str) -> Result<Option<WorkflowMessageData>, StoreError> {
        let entries = self.entries.read().await;
        let Some(serialized) = entries.get(workflow_id) else {
            return Ok(None);
        };
        Ok(Some(WorkflowMessageData::from_json_str(serialized)?))
    }
}

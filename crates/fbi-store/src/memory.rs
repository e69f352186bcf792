//! In-memory bulk index for testing and dry runs.
//!
//! [`MemoryIndex`] keeps documents in a map and records every call it
//! receives, so tests can assert on exactly which operations a handler sent.
//! It can also be told to fail, to exercise error paths.

use async_trait::async_trait;
use fbi_core::{
    AddOutcome, BulkIndex, DeleteOutcome, DocumentId, IndexError, IndexOperation,
    MetadataDocument,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// A call received by a [`MemoryIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    RefreshMapping,
    Add(Vec<DocumentId>),
    Delete(Vec<DocumentId>),
}

/// How a [`MemoryIndex`] should misbehave.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailureMode {
    #[default]
    None,
    /// Every call fails with a transport error
    Unavailable,
    /// Every item of every bulk request fails with this reason
    RejectItems(String),
}

/// In-memory document index.
#[derive(Default)]
pub struct MemoryIndex {
    documents: RwLock<HashMap<DocumentId, MetadataDocument>>,
    calls: RwLock<Vec<RecordedCall>>,
    failure: RwLock<FailureMode>,
}

impl MemoryIndex {
    /// Create a new empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Change how the index responds to subsequent calls.
    pub async fn set_failure(&self, mode: FailureMode) {
        *self.failure.write().await = mode;
    }

    /// Get a stored document.
    pub async fn get(&self, id: &DocumentId) -> Option<MetadataDocument> {
        self.documents.read().await.get(id).cloned()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Calls that mutate documents, ignoring mapping refreshes.
    pub async fn mutations(&self) -> Vec<RecordedCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| !matches!(c, RecordedCall::RefreshMapping))
            .cloned()
            .collect()
    }

    /// Number of mapping refreshes received.
    pub async fn refresh_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, RecordedCall::RefreshMapping))
            .count()
    }

    async fn record(&self, call: RecordedCall) -> Result<FailureMode, IndexError> {
        self.calls.write().await.push(call);
        match self.failure.read().await.clone() {
            FailureMode::Unavailable => {
                Err(IndexError::Transport("memory index unavailable".to_string()))
            }
            mode => Ok(mode),
        }
    }
}

#[async_trait]
impl BulkIndex for MemoryIndex {
    async fn refresh_mapping(&self) -> Result<(), IndexError> {
        self.record(RecordedCall::RefreshMapping).await?;
        debug!("Mapping refreshed");
        Ok(())
    }

    async fn add(&self, operations: &[IndexOperation]) -> Result<Vec<AddOutcome>, IndexError> {
        let ids = operations.iter().map(|op| op.id.clone()).collect();
        if let FailureMode::RejectItems(reason) = self.record(RecordedCall::Add(ids)).await? {
            return Ok(vec![AddOutcome::Failed(reason); operations.len()]);
        }

        let mut documents = self.documents.write().await;
        for op in operations {
            documents.insert(op.id.clone(), op.document.clone());
        }
        debug!("Indexed {} documents", operations.len());
        Ok(vec![AddOutcome::Indexed; operations.len()])
    }

    async fn delete(&self, ids: &[DocumentId]) -> Result<Vec<DeleteOutcome>, IndexError> {
        if let FailureMode::RejectItems(reason) =
            self.record(RecordedCall::Delete(ids.to_vec())).await?
        {
            return Ok(vec![DeleteOutcome::Failed(reason); ids.len()]);
        }

        let mut documents = self.documents.write().await;
        let outcomes = ids
            .iter()
            .map(|id| match documents.remove(id) {
                Some(_) => DeleteOutcome::Deleted,
                None => DeleteOutcome::NotFound,
            })
            .collect();
        debug!("Deleted {} documents", ids.len());
        Ok(outcomes)
    }
}

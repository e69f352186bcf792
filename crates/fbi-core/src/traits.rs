//! Core traits for fbi-sync components.
//!
//! - [`MetadataExtractor`]: produce metadata for one file type
//! - [`BulkIndex`]: apply batched upserts and deletes to the document store
//! - [`IdentityResolver`]: turn numeric uid/gid into names
//! - [`UpdateHandler`]: turn one change event into at most one index mutation
//! - [`MessageSource`]: deliver raw queue messages and take acknowledgements
//!
//! Everything outside the synchronization pipeline sits behind one of these
//! traits so it can be swapped without touching the pipeline.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{ExtractError, IndexError, ResolveError, Result};
use crate::types::{
    AddOutcome, ChangeEvent, DeleteOutcome, Delivery, DocumentId, ExtractOptions,
    ExtractionResult, IndexOperation,
};

// ============================================================================
// Metadata Extraction
// ============================================================================

/// Produces metadata for the file types it claims.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Glob patterns of the paths this extractor claims.
    fn patterns(&self) -> &[&str];

    /// Extract metadata from `path`.
    ///
    /// `Ok(None)` means the extractor had nothing to say about the file.
    async fn extract(
        &self,
        path: &Path,
        options: &ExtractOptions,
    ) -> std::result::Result<Option<ExtractionResult>, ExtractError>;
}

// ============================================================================
// Bulk Index
// ============================================================================

/// Batched access to the document store.
///
/// `add` and `delete` return one outcome per input item, in order. An `Err`
/// means the request as a whole failed.
#[async_trait]
pub trait BulkIndex: Send + Sync {
    /// Push the expected field mapping to the index.
    async fn refresh_mapping(&self) -> std::result::Result<(), IndexError>;

    /// Upsert documents.
    async fn add(
        &self,
        operations: &[IndexOperation],
    ) -> std::result::Result<Vec<AddOutcome>, IndexError>;

    /// Delete documents by id.
    async fn delete(
        &self,
        ids: &[DocumentId],
    ) -> std::result::Result<Vec<DeleteOutcome>, IndexError>;
}

// ============================================================================
// Identity
// ============================================================================

/// Resolves numeric owners to human-readable names.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_user(&self, uid: u32) -> std::result::Result<String, ResolveError>;

    async fn resolve_group(&self, gid: u32) -> std::result::Result<String, ResolveError>;
}

// ============================================================================
// Dispatch
// ============================================================================

/// Turns one change event into zero or one index mutation.
#[async_trait]
pub trait UpdateHandler: Send {
    /// Short name of the strategy, used in logs.
    fn name(&self) -> &'static str;

    /// Process one event. Errors are retryable and leave the message
    /// unacknowledged.
    async fn process_event(&mut self, event: &ChangeEvent) -> Result<()>;
}

/// A stream of raw queue messages with acknowledgement.
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next delivery. `None` once the source is exhausted.
    async fn next(&mut self) -> Result<Option<Delivery>>;

    /// Acknowledge a delivery; it will not be redelivered.
    async fn ack(&mut self, delivery: &Delivery) -> Result<()>;

    /// Give a delivery back without acknowledging it.
    async fn reject(&mut self, delivery: &Delivery) -> Result<()>;
}

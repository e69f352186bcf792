//! Document assembly and the index operations shared by both handlers.

use chrono::{DateTime, Utc};
use fbi_core::{
    AddOutcome, BulkIndex, DeleteOutcome, DocumentId, ExtractionResult, IndexError,
    IndexOperation, MetadataDocument,
};
use std::time::Duration;
use tracing::debug;

/// Merge an extractor's output into one document.
///
/// Phenomena are attached when present. Spatial metadata is only attached
/// alongside phenomena; without phenomena it is dropped. Fields the result
/// does not carry leave the base document untouched.
#[must_use]
pub fn assemble_document(result: ExtractionResult) -> MetadataDocument {
    let ExtractionResult {
        base: mut document,
        phenomena,
        spatial,
    } = result;

    if let Some(phenomena) = phenomena {
        document.info.phenomena = Some(phenomena);
        if let Some(spatial) = spatial {
            document.info.spatial = Some(spatial);
        }
    }

    document
}

/// Upsert the document for `path`. A failed item is an error.
pub async fn add_document(
    index: &dyn BulkIndex,
    path: &str,
    document: MetadataDocument,
) -> Result<(), IndexError> {
    let id = DocumentId::for_path(path);
    let operation = IndexOperation {
        id: id.clone(),
        document,
    };

    let outcomes = index.add(std::slice::from_ref(&operation)).await?;
    match outcomes.as_slice() {
        [AddOutcome::Indexed] => {
            debug!("Indexed {} as {}", path, id);
            Ok(())
        }
        [AddOutcome::Failed(reason)] => Err(IndexError::ItemFailed {
            id: id.to_string(),
            reason: reason.clone(),
        }),
        other => Err(IndexError::ResultCount {
            expected: 1,
            found: other.len(),
        }),
    }
}

/// Delete the document for `path`.
///
/// A document that is already absent counts as deleted. Any other item
/// failure is an error.
pub async fn delete_document(index: &dyn BulkIndex, path: &str) -> Result<(), IndexError> {
    let id = DocumentId::for_path(path);

    let outcomes = index.delete(std::slice::from_ref(&id)).await?;
    match outcomes.as_slice() {
        [DeleteOutcome::Deleted] => {
            debug!("Deleted {} ({})", path, id);
            Ok(())
        }
        [DeleteOutcome::NotFound] => {
            debug!("Document for {} was not in the index, nothing to delete", path);
            Ok(())
        }
        [DeleteOutcome::Failed(reason)] => Err(IndexError::ItemFailed {
            id: id.to_string(),
            reason: reason.clone(),
        }),
        other => Err(IndexError::ResultCount {
            expected: 1,
            found: other.len(),
        }),
    }
}

/// Tracks when the index mapping was last pushed.
#[derive(Debug, Clone)]
pub struct RefreshTimer {
    interval: Duration,
    last_refresh: Option<DateTime<Utc>>,
}

impl RefreshTimer {
    /// A timer that is due immediately.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_refresh: None,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Whether a refresh is due at `now`.
    ///
    /// Always due before the first refresh, and when the clock has moved
    /// backwards past the last refresh.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map_or(true, |elapsed| elapsed >= self.interval),
        }
    }

    pub fn mark_refreshed(&mut self, now: DateTime<Utc>) {
        self.last_refresh = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbi_core::{FileInfo, LOCATION_SCANNED};
    use fbi_store::{FailureMode, MemoryIndex, RecordedCall};
    use serde_json::json;

    fn base(path: &str) -> MetadataDocument {
        MetadataDocument {
            info: FileInfo::for_path(path, Some(10), LOCATION_SCANNED),
        }
    }

    // ========== Assembly Tests ==========

    #[test]
    fn test_assemble_base_only() {
        let doc = assemble_document(ExtractionResult::new(base("/badc/a.nc")));
        assert_eq!(doc, base("/badc/a.nc"));
    }

    #[test]
    fn test_assemble_with_phenomena_and_spatial() {
        let result = ExtractionResult::new(base("/badc/a.geojson"))
            .with_phenomena(json!([{"names": ["height"]}]))
            .with_spatial(json!({"coordinates": {"type": "envelope"}}));

        let doc = assemble_document(result);
        assert_eq!(doc.info.phenomena, Some(json!([{"names": ["height"]}])));
        assert_eq!(
            doc.info.spatial,
            Some(json!({"coordinates": {"type": "envelope"}}))
        );
    }

    #[test]
    fn test_assemble_drops_spatial_without_phenomena() {
        let result = ExtractionResult::new(base("/badc/a.geojson"))
            .with_spatial(json!({"coordinates": {"type": "envelope"}}));

        let doc = assemble_document(result);
        assert_eq!(doc.info.phenomena, None);
        assert_eq!(doc.info.spatial, None);
    }

    #[test]
    fn test_assemble_keeps_existing_fields() {
        let mut document = base("/badc/a.nc");
        document.info.spot_name = Some("cmip6".to_string());

        let doc = assemble_document(
            ExtractionResult::new(document).with_phenomena(json!([{"names": ["tas"]}])),
        );
        assert_eq!(doc.info.spot_name.as_deref(), Some("cmip6"));
        assert_eq!(doc.info.size, Some(10));
    }

    // ========== Index Operation Tests ==========

    #[tokio::test]
    async fn test_add_document_uses_path_id() {
        let index = MemoryIndex::new();
        add_document(&index, "/badc/a.nc", base("/badc/a.nc"))
            .await
            .unwrap();

        let id = DocumentId::for_path("/badc/a.nc");
        assert_eq!(index.calls().await, vec![RecordedCall::Add(vec![id.clone()])]);
        assert!(index.get(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_add_document_item_failure() {
        let index = MemoryIndex::new();
        index
            .set_failure(FailureMode::RejectItems("mapper_parsing_exception".to_string()))
            .await;

        let err = add_document(&index, "/badc/a.nc", base("/badc/a.nc"))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::ItemFailed { .. }));
    }

    #[tokio::test]
    async fn test_delete_document_twice_is_ok() {
        let index = MemoryIndex::new();
        add_document(&index, "/badc/a.nc", base("/badc/a.nc"))
            .await
            .unwrap();

        delete_document(&index, "/badc/a.nc").await.unwrap();
        delete_document(&index, "/badc/a.nc").await.unwrap();
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_document_failure_propagates() {
        let index = MemoryIndex::new();
        index
            .set_failure(FailureMode::RejectItems("cluster_block_exception".to_string()))
            .await;

        let err = delete_document(&index, "/badc/a.nc").await.unwrap_err();
        match err {
            IndexError::ItemFailed { reason, .. } => {
                assert_eq!(reason, "cluster_block_exception");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_delete_document_transport_failure_propagates() {
        let index = MemoryIndex::new();
        index.set_failure(FailureMode::Unavailable).await;

        let err = delete_document(&index, "/badc/a.nc").await.unwrap_err();
        assert!(matches!(err, IndexError::Transport(_)));
    }

    // ========== Refresh Timer Tests ==========

    #[test]
    fn test_refresh_timer_due_initially() {
        let timer = RefreshTimer::new(Duration::from_secs(30));
        assert!(timer.is_due(Utc::now()));
        assert!(timer.last_refresh().is_none());
    }

    #[test]
    fn test_refresh_timer_interval() {
        let start = Utc::now();
        let mut timer = RefreshTimer::new(Duration::from_secs(30));
        timer.mark_refreshed(start);

        assert!(!timer.is_due(start));
        assert!(!timer.is_due(start + chrono::Duration::seconds(29)));
        assert!(timer.is_due(start + chrono::Duration::seconds(30)));
    }

    #[test]
    fn test_refresh_timer_clock_moved_backwards() {
        let start = Utc::now();
        let mut timer = RefreshTimer::new(Duration::from_secs(30));
        timer.mark_refreshed(start);

        assert!(timer.is_due(start - chrono::Duration::seconds(1)));
    }
}

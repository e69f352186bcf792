//! Fast update handler: documents built from the message alone.

use async_trait::async_trait;
use fbi_core::{
    Action, BulkIndex, ChangeEvent, FileInfo, MetadataDocument, Result, UpdateHandler,
    LOCATION_ON_DISK,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::document::{add_document, delete_document};

/// Build the minimal document for a deposit event without touching the
/// file system.
#[must_use]
pub fn document_from_event(event: &ChangeEvent) -> MetadataDocument {
    MetadataDocument {
        info: FileInfo::for_path(&event.filepath, event.filesize, LOCATION_ON_DISK),
    }
}

/// Indexes path, name, type and size straight from the event.
///
/// Never reads the file, never refreshes the mapping, never enriches.
pub struct FastUpdateHandler {
    index: Arc<dyn BulkIndex>,
}

impl FastUpdateHandler {
    #[must_use]
    pub fn new(index: Arc<dyn BulkIndex>) -> Self {
        Self { index }
    }

    pub async fn process_deposit(&self, event: &ChangeEvent) -> Result<()> {
        let document = document_from_event(event);
        if !document.is_valid() {
            warn!("Skipping {}: no usable file name", event.filepath);
            return Ok(());
        }
        add_document(self.index.as_ref(), &event.filepath, document).await?;
        Ok(())
    }

    pub async fn process_deletion(&self, path: &str) -> Result<()> {
        delete_document(self.index.as_ref(), path).await?;
        Ok(())
    }
}

#[async_trait]
impl UpdateHandler for FastUpdateHandler {
    fn name(&self) -> &'static str {
        "fast"
    }

    async fn process_event(&mut self, event: &ChangeEvent) -> Result<()> {
        debug!("{} {}", event.action, event.filepath);
        match event.action {
            Action::Deposit => self.process_deposit(event).await,
            Action::Remove => self.process_deletion(&event.filepath).await,
            Action::Other(_) => Ok(()),
        }
    }
}

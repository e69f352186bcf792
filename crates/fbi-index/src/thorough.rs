//! Thorough update handler: scans the file, enriches, and indexes the result.

use async_trait::async_trait;
use fbi_core::{
    Action, BulkIndex, ChangeEvent, ExtractError, ExtractOptions, IdentityResolver, Result,
    UpdateHandler,
};
use fbi_extract::ExtractorRegistry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::document::{add_document, assemble_document, delete_document, RefreshTimer};
use crate::identity::resolve_owners;
use crate::spots::SpotMapping;

/// Settings for [`ThoroughUpdateHandler`].
#[derive(Debug, Clone)]
pub struct ThoroughConfig {
    /// Minimum time between two mapping refreshes
    pub refresh_interval: Duration,
    /// Passed to every extractor
    pub extract: ExtractOptions,
    /// How long to wait for a deposited file to become readable
    pub file_wait_timeout: Duration,
    /// Delay between readability checks
    pub file_poll_interval: Duration,
    /// Bound on each owner/group lookup
    pub resolver_timeout: Duration,
}

impl Default for ThoroughConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            extract: ExtractOptions {
                scan_level: 2,
                ..ExtractOptions::default()
            },
            file_wait_timeout: Duration::from_secs(10),
            file_poll_interval: Duration::from_millis(500),
            resolver_timeout: Duration::from_secs(2),
        }
    }
}

/// Builds full metadata documents from the file itself.
///
/// Before every event the index mapping is refreshed if the refresh interval
/// has elapsed. Deposits wait for the file, run the extractor claiming the
/// path, attach the spot name and resolved owners, and upsert the assembled
/// document. Removals delete by path.
pub struct ThoroughUpdateHandler {
    index: Arc<dyn BulkIndex>,
    extractors: Arc<ExtractorRegistry>,
    identity: Arc<dyn IdentityResolver>,
    spots: Arc<SpotMapping>,
    clock: Arc<dyn Clock>,
    timer: RefreshTimer,
    config: ThoroughConfig,
}

impl ThoroughUpdateHandler {
    pub fn new(
        index: Arc<dyn BulkIndex>,
        extractors: Arc<ExtractorRegistry>,
        identity: Arc<dyn IdentityResolver>,
        spots: Arc<SpotMapping>,
        config: ThoroughConfig,
    ) -> Self {
        Self {
            index,
            extractors,
            identity,
            spots,
            clock: Arc::new(SystemClock),
            timer: RefreshTimer::new(config.refresh_interval),
            config,
        }
    }

    /// Use `clock` for the refresh timer.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ThoroughConfig {
        &self.config
    }

    /// Push the mapping if the refresh interval has elapsed.
    ///
    /// A failed refresh leaves the timer untouched, so the next event tries
    /// again.
    pub async fn refresh_mapping_if_due(&mut self) -> Result<()> {
        let now = self.clock.now();
        if !self.timer.is_due(now) {
            return Ok(());
        }

        info!("Refreshing index mapping");
        self.index.refresh_mapping().await?;
        self.timer.mark_refreshed(now);
        Ok(())
    }

    /// Index a deposited file.
    ///
    /// Files that never become readable, that no extractor claims, or that
    /// yield no metadata are skipped without error.
    pub async fn process_deposit(&self, event: &ChangeEvent) -> Result<()> {
        let path = event.filepath.as_str();

        if !self.wait_for_file(Path::new(path)).await {
            warn!(
                "File {} not readable after {:?}, skipping",
                path, self.config.file_wait_timeout
            );
            return Ok(());
        }

        let Some(extractor) = self.extractors.select(path) else {
            debug!("No extractor claims {}", path);
            return Ok(());
        };

        let mut result = match extractor.extract(Path::new(path), &self.config.extract).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                debug!("Extractor {} produced nothing for {}", extractor.name(), path);
                return Ok(());
            }
            Err(ExtractError::NotFound(_)) => {
                warn!("File {} disappeared before it could be scanned", path);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(spot) = self.spots.get_spot(path) {
            result.base.info.spot_name = Some(spot.to_string());
        }
        resolve_owners(
            self.identity.as_ref(),
            &mut result.base.info,
            self.config.resolver_timeout,
        )
        .await;

        let document = assemble_document(result);
        if !document.is_valid() {
            warn!(
                "Extractor {} built an invalid document for {}, skipping",
                extractor.name(),
                path
            );
            return Ok(());
        }

        add_document(self.index.as_ref(), path, document).await?;
        Ok(())
    }

    /// Remove the document for `path`. Already-absent documents are fine.
    pub async fn process_deletion(&self, path: &str) -> Result<()> {
        delete_document(self.index.as_ref(), path).await?;
        Ok(())
    }

    /// Poll until `path` is a readable regular file or the wait timeout runs
    /// out.
    ///
    /// Only regular files are opened: opening a FIFO blocks until a writer
    /// shows up. The whole wait is bounded by the timeout regardless.
    async fn wait_for_file(&self, path: &Path) -> bool {
        let poll = async {
            loop {
                if is_readable_file(path).await {
                    return;
                }
                tokio::time::sleep(self.config.file_poll_interval).await;
            }
        };
        tokio::time::timeout(self.config.file_wait_timeout, poll)
            .await
            .is_ok()
    }
}

async fn is_readable_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => tokio::fs::File::open(path).await.is_ok(),
        _ => false,
    }
}

#[async_trait]
impl UpdateHandler for ThoroughUpdateHandler {
    fn name(&self) -> &'static str {
        "thorough"
    }

    async fn process_event(&mut self, event: &ChangeEvent) -> Result<()> {
        debug!("{} {}", event.action, event.filepath);
        self.refresh_mapping_if_due().await?;

        match event.action {
            Action::Deposit => self.process_deposit(event).await,
            Action::Remove => self.process_deletion(&event.filepath).await,
            Action::Other(_) => Ok(()),
        }
    }
}

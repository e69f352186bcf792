//! Queue consumer: decode, filter, dispatch, acknowledge.

use fbi_core::{ChangeEvent, MessageSource, Result, UpdateHandler};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::filter::PathFilter;

/// What became of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// The body could not be decoded
    Malformed,
    /// The path filter rejected the event
    Filtered,
    /// The action is not one the handlers act on
    Ignored,
    /// The handler processed the event
    Processed,
}

/// Counts of message outcomes over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    pub processed: u64,
    pub malformed: u64,
    pub filtered: u64,
    pub ignored: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Malformed => self.malformed += 1,
            MessageOutcome::Filtered => self.filtered += 1,
            MessageOutcome::Ignored => self.ignored += 1,
            MessageOutcome::Processed => self.processed += 1,
        }
    }

    /// Total messages acknowledged.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.processed + self.malformed + self.filtered + self.ignored
    }
}

/// Feeds queue messages through a path filter into one update handler.
///
/// Malformed, filtered and unsupported messages count as handled. Only a
/// handler error leaves a message unacknowledged.
pub struct QueueConsumer {
    filter: PathFilter,
    handler: Box<dyn UpdateHandler>,
}

impl QueueConsumer {
    #[must_use]
    pub fn new(filter: PathFilter, handler: Box<dyn UpdateHandler>) -> Self {
        Self { filter, handler }
    }

    /// Name of the handler messages are dispatched to.
    #[must_use]
    pub fn handler_name(&self) -> &'static str {
        self.handler.name()
    }

    /// Handle one message body.
    ///
    /// `Ok` means the message may be acknowledged. An `Err` comes from the
    /// handler and means it must not be.
    pub async fn handle_message(&mut self, body: &[u8]) -> Result<MessageOutcome> {
        let event = match ChangeEvent::decode(body) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    "Dropping malformed message {:?}: {}",
                    String::from_utf8_lossy(body),
                    e
                );
                return Ok(MessageOutcome::Malformed);
            }
        };

        if !self.filter.allow(&event.filepath) {
            debug!("Filtered out {}", event.filepath);
            return Ok(MessageOutcome::Filtered);
        }

        if !event.action.is_supported() {
            debug!("Ignoring action {} for {}", event.action, event.filepath);
            return Ok(MessageOutcome::Ignored);
        }

        if let Err(e) = self.handler.process_event(&event).await {
            error!("Error occurred while processing {:?}: {}", event, e);
            return Err(e);
        }
        Ok(MessageOutcome::Processed)
    }

    /// Consume `source` until it is exhausted or a message fails.
    ///
    /// Each message is acknowledged once handled. On a handler error the
    /// message is rejected and the error returned, stopping the run.
    pub async fn run<S>(&mut self, source: &mut S) -> Result<ConsumerStats>
    where
        S: MessageSource + ?Sized,
    {
        let mut stats = ConsumerStats::default();
        info!("Consuming messages with the {} handler", self.handler_name());

        while let Some(delivery) = source.next().await? {
            match self.handle_message(&delivery.body).await {
                Ok(outcome) => {
                    source.ack(&delivery).await?;
                    stats.record(outcome);
                }
                Err(e) => {
                    source.reject(&delivery).await?;
                    return Err(e);
                }
            }
        }

        info!(
            "Source exhausted: {} processed, {} filtered, {} ignored, {} malformed",
            stats.processed, stats.filtered, stats.ignored, stats.malformed
        );
        Ok(stats)
    }
}

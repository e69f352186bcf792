//! Synchronization pipeline from file-change events to the metadata index.
//!
//! Messages flow through:
//! decode → path filter → update handler → bulk index.
//!
//! # Components
//!
//! - [`QueueConsumer`]: decodes messages, filters paths, dispatches, acknowledges
//! - [`PathFilter`]: include/exclude glob patterns applied before dispatch
//! - [`ThoroughUpdateHandler`]: scans the file, enriches, refreshes the mapping
//! - [`FastUpdateHandler`]: indexes straight from the message, no file access
//! - [`SpotMapping`], [`PasswdResolver`]: enrichment sources for the thorough path
//! - [`LineSource`]: one message per line from a file or stdin
//!
//! # Example
//!
//! ```rust,ignore
//! use fbi_index::{FastUpdateHandler, LineSource, PathFilter, QueueConsumer};
//!
//! let handler = FastUpdateHandler::new(index);
//! let mut consumer = QueueConsumer::new(PathFilter::allow_all(), Box::new(handler));
//!
//! let mut source = LineSource::stdin();
//! let stats = consumer.run(&mut source).await?;
//! println!("{} events processed", stats.processed);
//! ```

pub mod clock;
pub mod consumer;
pub mod document;
pub mod fast;
pub mod filter;
pub mod identity;
pub mod source;
pub mod spots;
pub mod thorough;

pub use clock::{Clock, ManualClock, SystemClock};
pub use consumer::{ConsumerStats, MessageOutcome, QueueConsumer};
pub use document::{add_document, assemble_document, delete_document, RefreshTimer};
pub use fast::{document_from_event, FastUpdateHandler};
pub use filter::{FilterError, PathFilter, PathFilterConfig};
pub use identity::{resolve_owners, PasswdResolver, StaticResolver};
pub use source::LineSource;
pub use spots::SpotMapping;
pub use thorough::{ThoroughConfig, ThoroughUpdateHandler};

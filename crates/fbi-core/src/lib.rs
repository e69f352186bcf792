//! # fbi-core
//!
//! Core types and traits for `fbi-sync`, the service that keeps a file
//! metadata index in step with file-change notifications from a message queue.
//!
//! This crate provides the shared vocabulary used by the other crates:
//!
//! - **Change events**: [`ChangeEvent`] decoded from raw queue messages
//! - **Documents**: [`MetadataDocument`] and [`FileInfo`], the unit written to the index
//! - **Extraction**: [`ExtractionResult`] and the [`MetadataExtractor`] trait
//! - **Index access**: [`BulkIndex`] with explicit [`AddOutcome`] / [`DeleteOutcome`] results
//! - **Identity**: [`IdentityResolver`] for uid/gid to name lookups
//! - **Dispatch**: [`UpdateHandler`] and [`MessageSource`]
//!
//! ## Architecture
//!
//! ```text
//! MessageSource → QueueConsumer → PathFilter → UpdateHandler → BulkIndex
//!                                                   ↑
//!                               ExtractorRegistry, IdentityResolver (thorough only)
//! ```
//!
//! ## Related Crates
//!
//! - `fbi-extract`: extractor registry and built-in extractors
//! - `fbi-store`: in-memory and Elasticsearch bulk index clients
//! - `fbi-index`: the queue consumer and the two update handlers
//! - `fbi-sync`: command-line binary

pub mod error;
pub mod path;
pub mod traits;
pub mod types;

pub use error::{DecodeError, Error, ExtractError, IndexError, ResolveError, Result};
pub use traits::*;
pub use types::*;

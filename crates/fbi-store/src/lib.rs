//! Bulk index clients for fbi-sync.
//!
//! This crate provides the [`BulkIndex`](fbi_core::BulkIndex) implementations
//! the update handlers write through.
//!
//! # Backends
//!
//! - [`ElasticsearchIndex`]: talks to Elasticsearch through the `_bulk` API
//! - [`MemoryIndex`]: keeps documents in memory and records every call; used
//!   by tests and by `fbi-sync consume --dry-run`
//!
//! # Example
//!
//! ```rust,ignore
//! use fbi_store::{ElasticsearchConfig, ElasticsearchIndex};
//! use fbi_core::BulkIndex;
//!
//! let index = ElasticsearchIndex::new(ElasticsearchConfig {
//!     url: "http://localhost:9200".into(),
//!     index: "fbi".into(),
//!     api_key: None,
//!     api_key_header: "x-api-key".into(),
//!     timeout: Duration::from_secs(30),
//! })?;
//! index.refresh_mapping().await?;
//! index.add(&operations).await?;
//! ```

pub mod elasticsearch;
pub mod mapping;
pub mod memory;

pub use elasticsearch::{ElasticsearchConfig, ElasticsearchIndex, DEFAULT_API_KEY_HEADER};
pub use mapping::file_index_mapping;
pub use memory::{FailureMode, MemoryIndex, RecordedCall};

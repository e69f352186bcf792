//! # fbi-extract
//!
//! Per-file-type metadata extraction for the thorough update path.
//!
//! ## Extractors
//!
//! | Extractor | Claims | Produces |
//! |-----------|--------|----------|
//! | [`GeoJsonExtractor`] | `*.geojson`, `*.geo.json` | file metadata, property names as phenomena, bounding box as spatial extent |
//! | [`GenericFileExtractor`] | `*` | file metadata: size, mtime, numeric owner/group, optional checksum |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fbi_extract::ExtractorRegistry;
//! use fbi_core::ExtractOptions;
//!
//! let registry = ExtractorRegistry::with_defaults()?;
//! if let Some(extractor) = registry.select("/badc/roads.geojson") {
//!     let result = extractor.extract(path, &ExtractOptions::default()).await?;
//! }
//! ```

pub mod generic;
pub mod geojson;
pub mod registry;

pub use generic::GenericFileExtractor;
pub use geojson::GeoJsonExtractor;
pub use registry::ExtractorRegistry;

//! Extractor registry for picking a metadata extractor by path.

use fbi_core::MetadataExtractor;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::sync::Arc;
use tracing::debug;

use crate::{GenericFileExtractor, GeoJsonExtractor};

struct Entry {
    extractor: Arc<dyn MetadataExtractor>,
    claims: GlobSet,
}

/// Priority-ordered registry of metadata extractors.
///
/// Extractors are consulted in registration order; the first one whose
/// patterns match the path wins.
pub struct ExtractorRegistry {
    entries: Vec<Entry>,
}

impl ExtractorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry with the built-in extractors: GeoJSON first, then the
    /// generic catch-all.
    pub fn with_defaults() -> Result<Self, globset::Error> {
        let mut registry = Self::new();
        registry.register(GeoJsonExtractor::new())?;
        registry.register(GenericFileExtractor::new())?;
        Ok(registry)
    }

    /// Register an extractor at the lowest priority.
    ///
    /// Fails if one of the extractor's patterns is not a valid glob.
    pub fn register<E: MetadataExtractor + 'static>(
        &mut self,
        extractor: E,
    ) -> Result<(), globset::Error> {
        self.register_arc(Arc::new(extractor))
    }

    /// Register a shared extractor at the lowest priority.
    pub fn register_arc(
        &mut self,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<(), globset::Error> {
        let claims = extractor
            .patterns()
            .iter()
            .map(|p| Glob::new(p))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .fold(&mut GlobSetBuilder::new(), |builder, glob| builder.add(glob))
            .build()?;

        debug!("Registered extractor {}", extractor.name());
        self.entries.push(Entry { extractor, claims });
        Ok(())
    }

    /// Pick the extractor for `path`, or `None` if no extractor claims it.
    #[must_use]
    pub fn select(&self, path: &str) -> Option<Arc<dyn MetadataExtractor>> {
        self.entries
            .iter()
            .find(|entry| entry.claims.is_match(path))
            .map(|entry| Arc::clone(&entry.extractor))
    }

    /// Names of the registered extractors, in priority order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.extractor.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

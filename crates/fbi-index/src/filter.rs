//! Path filter applied to every decoded event before dispatch.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors building a [`PathFilter`].
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Include/exclude glob patterns, as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFilterConfig {
    /// If non-empty, a path must match at least one of these
    #[serde(default)]
    pub include: Vec<String>,
    /// A path matching any of these is rejected
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Decides whether an event path is eligible for processing.
///
/// Empty paths and paths containing NUL bytes are always rejected.
/// Exclusion takes precedence over inclusion.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PathFilter {
    /// A filter that only rejects malformed paths.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Build a filter from glob patterns. Empty lists disable that side.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, FilterError> {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
        })
    }

    pub fn from_config(config: &PathFilterConfig) -> Result<Self, FilterError> {
        Self::new(&config.include, &config.exclude)
    }

    /// Whether `path` should be processed.
    #[must_use]
    pub fn allow(&self, path: &str) -> bool {
        if path.trim().is_empty() || path.contains('\0') {
            return false;
        }
        if self.exclude.as_ref().is_some_and(|set| set.is_match(path)) {
            return false;
        }
        self.include.as_ref().map_or(true, |set| set.is_match(path))
    }
}

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>, FilterError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| FilterError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|source| FilterError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_allow_all_accepts_ordinary_paths() {
        let filter = PathFilter::allow_all();
        assert!(filter.allow("/badc/cmip6/data/tas.nc"));
        assert!(filter.allow("relative/file"));
    }

    #[test]
    fn test_rejects_malformed_paths() {
        let filter = PathFilter::allow_all();
        assert!(!filter.allow(""));
        assert!(!filter.allow("   "));
        assert!(!filter.allow("/badc/bad\0name"));
    }

    #[test]
    fn test_include_patterns() {
        let filter = PathFilter::new(&patterns(&["/badc/**", "/neodc/**"]), &[]).unwrap();
        assert!(filter.allow("/badc/cmip6/tas.nc"));
        assert!(filter.allow("/neodc/sentinel/x.zip"));
        assert!(!filter.allow("/home/user/notes.txt"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter =
            PathFilter::new(&patterns(&["/badc/**"]), &patterns(&["**/.*", "**/*.tmp"])).unwrap();
        assert!(filter.allow("/badc/data/tas.nc"));
        assert!(!filter.allow("/badc/data/.hidden"));
        assert!(!filter.allow("/badc/data/upload.tmp"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PathFilter::new(&patterns(&["/badc/[unclosed"]), &[]).unwrap_err();
        assert!(err.to_string().contains("[unclosed"));
    }

    #[test]
    fn test_from_config() {
        let config = PathFilterConfig {
            include: vec![],
            exclude: patterns(&["**/*.swp"]),
        };
        let filter = PathFilter::from_config(&config).unwrap();
        assert!(filter.allow("/badc/a.nc"));
        assert!(!filter.allow("/badc/.a.nc.swp"));
    }
}

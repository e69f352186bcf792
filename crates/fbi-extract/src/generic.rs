//! Generic file extractor.
//!
//! Works for any regular file: reports the path-derived fields, size,
//! modification time, numeric owner and group and, on request, a content
//! checksum.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fbi_core::{
    ExtractError, ExtractOptions, ExtractionResult, FileInfo, MetadataDocument,
    MetadataExtractor, Owner, LOCATION_SCANNED,
};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

/// Read buffer used while hashing.
const CHECKSUM_BUF_SIZE: usize = 64 * 1024;

/// Catch-all extractor based on file-system metadata.
pub struct GenericFileExtractor;

impl GenericFileExtractor {
    /// Create a new generic extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenericFileExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataExtractor for GenericFileExtractor {
    fn name(&self) -> &str {
        "generic"
    }

    fn patterns(&self) -> &[&str] {
        &["*"]
    }

    async fn extract(
        &self,
        path: &Path,
        options: &ExtractOptions,
    ) -> Result<Option<ExtractionResult>, ExtractError> {
        Ok(base_document(path, options)
            .await?
            .map(ExtractionResult::new))
    }
}

/// Build the stat-based document for `path`.
///
/// Returns `None` for anything that is not a regular file.
pub(crate) async fn base_document(
    path: &Path,
    options: &ExtractOptions,
) -> Result<Option<MetadataDocument>, ExtractError> {
    let path_str = path.to_string_lossy();
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| ExtractError::from_io(&path_str, e))?;

    if !metadata.is_file() {
        return Ok(None);
    }

    let mut info = FileInfo::for_path(&path_str, Some(metadata.len()), LOCATION_SCANNED);
    info.last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        info.user = Some(Owner::Id(metadata.uid()));
        info.group = Some(Owner::Id(metadata.gid()));
    }

    if options.calculate_checksum {
        info.checksum = Some(compute_checksum(path).await?);
    }

    Ok(Some(MetadataDocument { info }))
}

/// Compute the blake3 hex digest of a file, streaming it in chunks.
async fn compute_checksum(path: &Path) -> Result<String, ExtractError> {
    let path_str = path.to_string_lossy();
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| ExtractError::from_io(&path_str, e))?;

    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHECKSUM_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbi_core::NO_EXTENSION;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_extract_regular_file() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("tas.nc");
        std::fs::write(&file_path, b"0123456789").unwrap();

        let result = GenericFileExtractor::new()
            .extract(&file_path, &ExtractOptions::default())
            .await
            .unwrap()
            .unwrap();

        let info = &result.base.info;
        assert_eq!(info.name, "tas.nc");
        assert_eq!(info.file_type, ".nc");
        assert_eq!(info.directory, temp_dir.path().to_string_lossy());
        assert_eq!(info.size, Some(10));
        assert_eq!(info.location, LOCATION_SCANNED);
        assert!(info.last_modified.is_some());
        assert!(info.checksum.is_none());
        assert!(result.phenomena.is_none());
        assert!(result.spatial.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extract_reports_numeric_owner() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("owned");
        std::fs::write(&file_path, b"x").unwrap();

        let result = GenericFileExtractor::new()
            .extract(&file_path, &ExtractOptions::default())
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(result.base.info.user, Some(Owner::Id(_))));
        assert!(matches!(result.base.info.group, Some(Owner::Id(_))));
        assert_eq!(result.base.info.file_type, NO_EXTENSION);
    }

    #[tokio::test]
    async fn test_extract_with_checksum() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("data.bin");
        std::fs::write(&file_path, b"hello world").unwrap();

        let options = ExtractOptions {
            calculate_checksum: true,
            ..ExtractOptions::default()
        };
        let result = GenericFileExtractor::new()
            .extract(&file_path, &options)
            .await
            .unwrap()
            .unwrap();

        let expected = blake3::hash(b"hello world").to_hex().to_string();
        assert_eq!(result.base.info.checksum, Some(expected));
    }

    #[tokio::test]
    async fn test_extract_directory_returns_none() {
        let temp_dir = tempdir().unwrap();
        let result = GenericFileExtractor::new()
            .extract(temp_dir.path(), &ExtractOptions::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_extract_missing_file_is_not_found() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("gone.nc");

        let err = GenericFileExtractor::new()
            .extract(&missing, &ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NotFound(_)));
    }
}

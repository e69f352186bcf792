//! Core types for fbi-sync.
//!
//! ## Change Events
//! - [`ChangeEvent`]: a decoded queue message
//! - [`Action`]: what happened to the file
//! - [`Delivery`]: a raw message handed over by a [`MessageSource`](crate::MessageSource)
//!
//! ## Documents
//! - [`MetadataDocument`]: the unit written to the index
//! - [`FileInfo`]: the `info` section of a document
//! - [`Owner`]: a numeric or resolved owner/group
//! - [`DocumentId`]: deterministic identifier derived from a path
//!
//! ## Extraction
//! - [`ExtractionResult`]: base document plus optional phenomena and spatial metadata
//! - [`ExtractOptions`]: scan depth and checksum flag passed to extractors
//!
//! ## Index Operations
//! - [`IndexOperation`]: one upsert
//! - [`AddOutcome`] / [`DeleteOutcome`]: per-item bulk results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::DecodeError;

// ============================================================================
// Change Events
// ============================================================================

/// The kind of change a message reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// A file was created or updated and should be (re)indexed
    Deposit,
    /// A file was deleted and should be removed from the index
    Remove,
    /// Any other action string; acknowledged without effect
    Other(String),
}

impl Action {
    /// Wire representation of the action.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Remove => "REMOVE",
            Self::Other(s) => s,
        }
    }

    /// Whether an update handler acts on this action.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Deposit | Self::Remove)
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        match value.as_str() {
            "DEPOSIT" => Self::Deposit,
            "REMOVE" => Self::Remove,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Action> for String {
    fn from(value: Action) -> Self {
        match value {
            Action::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file-system change event decoded from a queue message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    /// Absolute path of the changed file
    pub filepath: String,
    /// What happened to the file
    pub action: Action,
    /// File size in bytes, usually only present for deposits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
    /// Producer timestamp, carried through for logging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    /// Free-form producer message, carried through for logging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Minimum number of `:`-separated fields in the legacy text format:
/// three for the timestamp, then path, action and size. Everything after
/// the size is the free-text message, which may itself contain `:`.
const LEGACY_MIN_FIELDS: usize = 6;

#[derive(Deserialize)]
struct RawMessage {
    filepath: String,
    action: String,
    #[serde(default)]
    filesize: Option<RawSize>,
    #[serde(default)]
    datetime: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Number(u64),
    Text(String),
}

impl ChangeEvent {
    /// Create a deposit event.
    pub fn deposit(filepath: impl Into<String>, filesize: Option<u64>) -> Self {
        Self {
            filepath: filepath.into(),
            action: Action::Deposit,
            filesize,
            datetime: None,
            message: None,
        }
    }

    /// Create a removal event.
    pub fn remove(filepath: impl Into<String>) -> Self {
        Self {
            filepath: filepath.into(),
            action: Action::Remove,
            filesize: None,
            datetime: None,
            message: None,
        }
    }

    /// Decode a raw message body.
    ///
    /// Bodies starting with `{` are parsed as JSON objects. Anything else is
    /// parsed as the legacy `YYYY-MM-DD HH:MM:SS:path:action:size:message`
    /// text format.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(body)?.trim();
        if text.starts_with('{') {
            Self::decode_json(text)
        } else {
            Self::decode_legacy(text)
        }
    }

    fn decode_json(text: &str) -> Result<Self, DecodeError> {
        let raw: RawMessage = serde_json::from_str(text)?;
        let filesize = match raw.filesize {
            None => None,
            Some(RawSize::Number(n)) => Some(n),
            Some(RawSize::Text(s)) => parse_filesize(&s)?,
        };
        Self::validated(raw.filepath, &raw.action, filesize, raw.datetime, raw.message)
    }

    fn decode_legacy(text: &str) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = text.split(':').collect();
        if fields.len() < LEGACY_MIN_FIELDS {
            return Err(DecodeError::TooFewFields {
                min: LEGACY_MIN_FIELDS,
                found: fields.len(),
            });
        }

        let datetime = fields[..3].join(":");
        let filesize = parse_filesize(fields[5])?;
        let message = Some(fields[6..].join(":")).filter(|m| !m.is_empty());

        Self::validated(
            fields[3].to_string(),
            fields[4],
            filesize,
            Some(datetime),
            message,
        )
    }

    fn validated(
        filepath: String,
        action: &str,
        filesize: Option<u64>,
        datetime: Option<String>,
        message: Option<String>,
    ) -> Result<Self, DecodeError> {
        if filepath.trim().is_empty() {
            return Err(DecodeError::EmptyPath);
        }
        let action = action.trim();
        if action.is_empty() {
            return Err(DecodeError::EmptyAction);
        }

        Ok(Self {
            filepath,
            action: Action::from(action),
            filesize,
            datetime,
            message,
        })
    }
}

fn parse_filesize(s: &str) -> Result<Option<u64>, DecodeError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    s.parse()
        .map(Some)
        .map_err(|_| DecodeError::InvalidFilesize(s.to_string()))
}

/// A raw message handed over by a message source, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Source-specific delivery tag used for acknowledgement
    pub tag: u64,
    /// Undecoded message body
    pub body: Vec<u8>,
}

// ============================================================================
// Documents
// ============================================================================

/// Location marker for documents built from the message alone.
pub const LOCATION_ON_DISK: &str = "on_disk";

/// Location marker for documents built from a file-system scan.
pub const LOCATION_SCANNED: &str = "scanned";

/// Sentinel `info.type` for files without an extension.
pub const NO_EXTENSION: &str = "File without extension.";

/// The unit written to the index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub info: FileInfo,
}

/// A file owner or group, either still numeric or resolved to a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Owner {
    Id(u32),
    Name(String),
}

/// The `info` section of a [`MetadataDocument`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name
    pub name: String,
    /// File name, analysed for autocompletion by the index
    pub name_auto: String,
    /// File extension including the dot, or [`NO_EXTENSION`]
    #[serde(rename = "type")]
    pub file_type: String,
    /// Parent directory
    pub directory: String,
    /// Size in bytes
    pub size: Option<u64>,
    /// Storage location marker
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Owner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Owner>,
    /// Logical storage-area label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phenomena: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<Value>,
    /// Content checksum (blake3 hex), when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Extractor-specific fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileInfo {
    /// Fill the path-derived fields (`name`, `name_auto`, `type`,
    /// `directory`) from `path`, leaving everything else unset.
    #[must_use]
    pub fn for_path(path: &str, size: Option<u64>, location: &str) -> Self {
        let name = crate::path::basename(path);
        let file_type = match crate::path::extension(path) {
            "" => NO_EXTENSION,
            ext => ext,
        };

        Self {
            name: name.to_string(),
            name_auto: name.to_string(),
            file_type: file_type.to_string(),
            directory: crate::path::dirname(path).to_string(),
            size,
            location: location.to_string(),
            ..Default::default()
        }
    }
}

impl MetadataDocument {
    /// Whether the document satisfies the write invariant: a non-empty
    /// `info.name` and `info.type`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.info.name.is_empty() && !self.info.file_type.is_empty()
    }
}

/// Deterministic document identifier derived from a file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Derive the identifier for `path`: the lower-case hex blake3 digest of
    /// its UTF-8 bytes.
    #[must_use]
    pub fn for_path(path: &str) -> Self {
        Self(blake3::hash(path.as_bytes()).to_hex().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Options passed to every extractor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// How deep the extractor should look into the file
    pub scan_level: u8,
    /// Compute a content checksum
    pub calculate_checksum: bool,
    /// Largest file whose content is parsed for phenomena and spatial extent
    pub max_content_bytes: u64,
}

/// Default cap on parsed file content (64 MiB).
pub const DEFAULT_MAX_CONTENT_BYTES: u64 = 64 * 1024 * 1024;

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            scan_level: 1,
            calculate_checksum: false,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
        }
    }
}

/// What an extractor produced for one file.
///
/// The fields are positional: `spatial` is only meaningful when `phenomena`
/// is present, and is dropped during assembly otherwise.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionResult {
    pub base: MetadataDocument,
    pub phenomena: Option<Value>,
    pub spatial: Option<Value>,
}

impl ExtractionResult {
    #[must_use]
    pub fn new(base: MetadataDocument) -> Self {
        Self {
            base,
            phenomena: None,
            spatial: None,
        }
    }

    #[must_use]
    pub fn with_phenomena(mut self, phenomena: Value) -> Self {
        self.phenomena = Some(phenomena);
        self
    }

    #[must_use]
    pub fn with_spatial(mut self, spatial: Value) -> Self {
        self.spatial = Some(spatial);
        self
    }
}

// ============================================================================
// Index Operations
// ============================================================================

/// One upsert sent to the bulk index client.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOperation {
    pub id: DocumentId,
    pub document: MetadataDocument,
}

/// Per-item result of a bulk add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Indexed,
    Failed(String),
}

/// Per-item result of a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The document was already absent
    NotFound,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========== Action Tests ==========

    #[test]
    fn test_action_from_known_strings() {
        assert_eq!(Action::from("DEPOSIT"), Action::Deposit);
        assert_eq!(Action::from("REMOVE"), Action::Remove);
        assert_eq!(Action::from("MKDIR"), Action::Other("MKDIR".to_string()));
    }

    #[test]
    fn test_action_is_supported() {
        assert!(Action::Deposit.is_supported());
        assert!(Action::Remove.is_supported());
        assert!(!Action::Other("SYMLINK".to_string()).is_supported());
    }

    #[test]
    fn test_action_is_case_sensitive() {
        assert_eq!(Action::from("deposit"), Action::Other("deposit".to_string()));
    }

    // ========== Decode Tests ==========

    #[test]
    fn test_decode_json_message() {
        let body = br#"{"filepath": "/data/obs/file.nc", "action": "DEPOSIT", "filesize": 120}"#;
        let event = ChangeEvent::decode(body).unwrap();
        assert_eq!(event.filepath, "/data/obs/file.nc");
        assert_eq!(event.action, Action::Deposit);
        assert_eq!(event.filesize, Some(120));
    }

    #[test]
    fn test_decode_json_string_filesize() {
        let body = br#"{"filepath": "/a/b", "action": "DEPOSIT", "filesize": "4096"}"#;
        let event = ChangeEvent::decode(body).unwrap();
        assert_eq!(event.filesize, Some(4096));
    }

    #[test]
    fn test_decode_json_without_filesize() {
        let body = br#"{"filepath": "/a/b", "action": "REMOVE"}"#;
        let event = ChangeEvent::decode(body).unwrap();
        assert_eq!(event.action, Action::Remove);
        assert_eq!(event.filesize, None);
    }

    #[test]
    fn test_decode_json_unknown_action_is_not_an_error() {
        let body = br#"{"filepath": "/a/b", "action": "MKDIR"}"#;
        let event = ChangeEvent::decode(body).unwrap();
        assert_eq!(event.action, Action::Other("MKDIR".to_string()));
    }

    #[test]
    fn test_decode_json_missing_filepath() {
        let body = br#"{"action": "DEPOSIT"}"#;
        assert!(matches!(
            ChangeEvent::decode(body),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_decode_json_invalid_filesize() {
        let body = br#"{"filepath": "/a/b", "action": "DEPOSIT", "filesize": "big"}"#;
        assert!(matches!(
            ChangeEvent::decode(body),
            Err(DecodeError::InvalidFilesize(_))
        ));
    }

    #[test]
    fn test_decode_json_empty_path() {
        let body = br#"{"filepath": " ", "action": "DEPOSIT"}"#;
        assert!(matches!(
            ChangeEvent::decode(body),
            Err(DecodeError::EmptyPath)
        ));
    }

    #[test]
    fn test_decode_legacy_message() {
        let body = b"2021-04-01 12:30:05:/badc/cmip5/data/tas.nc:DEPOSIT:2048:";
        let event = ChangeEvent::decode(body).unwrap();
        assert_eq!(event.filepath, "/badc/cmip5/data/tas.nc");
        assert_eq!(event.action, Action::Deposit);
        assert_eq!(event.filesize, Some(2048));
        assert_eq!(event.datetime.as_deref(), Some("2021-04-01 12:30:05"));
        assert_eq!(event.message, None);
    }

    #[test]
    fn test_decode_legacy_empty_filesize() {
        let body = b"2021-04-01 12:30:05:/badc/x:REMOVE::deleted by user";
        let event = ChangeEvent::decode(body).unwrap();
        assert_eq!(event.action, Action::Remove);
        assert_eq!(event.filesize, None);
        assert_eq!(event.message.as_deref(), Some("deleted by user"));
    }

    #[test]
    fn test_decode_legacy_message_with_colons() {
        let body = b"2021-04-01 12:30:05:/badc/a.nc:DEPOSIT:2048:md5: abc";
        let event = ChangeEvent::decode(body).unwrap();
        assert_eq!(event.filepath, "/badc/a.nc");
        assert_eq!(event.filesize, Some(2048));
        assert_eq!(event.message.as_deref(), Some("md5: abc"));
    }

    #[test]
    fn test_decode_legacy_without_message_field() {
        let event = ChangeEvent::decode(b"2021-04-01 12:30:05:/badc/a.nc:DEPOSIT:2048").unwrap();
        assert_eq!(event.action, Action::Deposit);
        assert_eq!(event.filesize, Some(2048));
        assert_eq!(event.message, None);
    }

    #[test]
    fn test_decode_legacy_too_few_fields() {
        let err = ChangeEvent::decode(b"/badc/x:DEPOSIT").unwrap_err();
        assert!(matches!(err, DecodeError::TooFewFields { min: 6, found: 2 }));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let err = ChangeEvent::decode(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, DecodeError::Utf8(_)));
    }

    // ========== Document Tests ==========

    #[test]
    fn test_document_serializes_type_field() {
        let doc = MetadataDocument {
            info: FileInfo {
                name: "tas.nc".to_string(),
                name_auto: "tas.nc".to_string(),
                file_type: ".nc".to_string(),
                directory: "/badc".to_string(),
                size: Some(10),
                location: LOCATION_ON_DISK.to_string(),
                ..Default::default()
            },
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["info"]["type"], ".nc");
        assert!(value["info"].get("user").is_none());
        assert!(value["info"].get("spatial").is_none());
    }

    #[test]
    fn test_document_extra_fields_are_flattened() {
        let mut info = FileInfo {
            name: "a".to_string(),
            file_type: ".b".to_string(),
            ..Default::default()
        };
        info.extra.insert("format".to_string(), json!("GeoJSON"));

        let value = serde_json::to_value(MetadataDocument { info }).unwrap();
        assert_eq!(value["info"]["format"], "GeoJSON");
    }

    #[test]
    fn test_owner_serializes_untagged() {
        assert_eq!(serde_json::to_value(Owner::Id(1000)).unwrap(), json!(1000));
        assert_eq!(
            serde_json::to_value(Owner::Name("alice".to_string())).unwrap(),
            json!("alice")
        );
    }

    #[test]
    fn test_file_info_for_path_without_extension() {
        let info = FileInfo::for_path("/data/obs/readme", Some(120), LOCATION_ON_DISK);
        assert_eq!(info.name, "readme");
        assert_eq!(info.name_auto, "readme");
        assert_eq!(info.file_type, NO_EXTENSION);
        assert_eq!(info.directory, "/data/obs");
        assert_eq!(info.size, Some(120));
        assert_eq!(info.location, "on_disk");
    }

    #[test]
    fn test_file_info_for_path_with_extension() {
        let info = FileInfo::for_path("/badc/cmip5/tas.nc", None, LOCATION_SCANNED);
        assert_eq!(info.file_type, ".nc");
        assert_eq!(info.size, None);
        assert!(info.user.is_none());
    }

    #[test]
    fn test_document_validity() {
        let mut doc = MetadataDocument::default();
        assert!(!doc.is_valid());
        doc.info.name = "readme".to_string();
        assert!(!doc.is_valid());
        doc.info.file_type = NO_EXTENSION.to_string();
        assert!(doc.is_valid());
    }

    // ========== DocumentId Tests ==========

    #[test]
    fn test_document_id_is_deterministic() {
        let a = DocumentId::for_path("/badc/cmip5/tas.nc");
        let b = DocumentId::for_path("/badc/cmip5/tas.nc");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_document_id_differs_per_path() {
        assert_ne!(
            DocumentId::for_path("/badc/a.nc"),
            DocumentId::for_path("/badc/b.nc")
        );
    }
}

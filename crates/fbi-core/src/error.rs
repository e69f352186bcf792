//! Error types for fbi-sync.

use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A queue message could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Metadata extraction failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// Index client operation failed
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while decoding a raw queue message.
///
/// All of these are permanent: redelivering the same bytes cannot succeed.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("message is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected at least {min} fields, found {found}")]
    TooFewFields { min: usize, found: usize },

    #[error("message has an empty file path")]
    EmptyPath,

    #[error("message has an empty action")]
    EmptyAction,

    #[error("invalid file size: {0:?}")]
    InvalidFilesize(String),
}

/// Metadata extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The file disappeared between selection and extraction
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Build an error from an I/O failure on `path`, keeping "not found"
    /// distinct from other I/O failures.
    pub fn from_io(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io(err)
        }
    }
}

/// Bulk index client errors.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The index could not be reached or returned a request-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// One item of a bulk request failed
    #[error("bulk item {id} failed: {reason}")]
    ItemFailed { id: String, reason: String },

    /// The mapping refresh call was rejected
    #[error("mapping refresh failed: {0}")]
    Mapping(String),

    /// The client returned a different number of results than operations sent
    #[error("expected {expected} bulk results, got {found}")]
    ResultCount { expected: usize, found: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Identity resolution errors.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("unknown uid {0}")]
    UnknownUser(u32),

    #[error("unknown gid {0}")]
    UnknownGroup(u32),

    #[error("directory service unavailable: {0}")]
    Unavailable(String),

    #[error("lookup timed out")]
    Timeout,
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

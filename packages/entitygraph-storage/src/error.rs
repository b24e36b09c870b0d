//! Error types for entitygraph-storage

use std::fmt;
use thiserror::Error;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Identifier would change path semantics or fails the percent-encoding round trip
    InvalidIdentifier,
    /// Duplicate entity, version or queue item
    Conflict,
    /// Missing entity, version, sub-element, datastream or queue item
    NotFound,
    /// Zero or multiple values where exactly one is expected
    CorruptState,
    /// Metadata path of unsupported depth or slot name
    UnsupportedMetadataPath,
    /// Operation not valid in the current deployment mode
    UnsupportedOperation,
    /// Any lower-layer failure (database, index, serialization, I/O)
    BackendFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidIdentifier => "invalid_identifier",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::CorruptState => "corrupt_state",
            ErrorKind::UnsupportedMetadataPath => "unsupported_metadata_path",
            ErrorKind::UnsupportedOperation => "unsupported_operation",
            ErrorKind::BackendFailure => "backend_failure",
        }
    }

    /// Caller supplied bad input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidIdentifier | ErrorKind::Conflict | ErrorKind::UnsupportedMetadataPath
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::BackendFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    // Convenience constructors
    pub fn invalid_identifier(id: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::InvalidIdentifier,
            format!("Invalid identifier: {:?}", id.as_ref()),
        )
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("Not found: {}", what))
    }

    pub fn corrupt_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptState, message)
    }

    pub fn unsupported_metadata_path(path: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::UnsupportedMetadataPath,
            format!("Unsupported metadata path: {}", path.as_ref()),
        )
    }

    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendFailure, message)
    }
}

// SQLite error conversions
#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::backend(format!("SQLite error: {}", err)).with_source(err)
    }
}

#[cfg(feature = "sqlite")]
impl From<tantivy::TantivyError> for StorageError {
    fn from(err: tantivy::TantivyError) -> Self {
        StorageError::backend(format!("Index error: {}", err)).with_source(err)
    }
}

// JSON error conversions
impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::backend(format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::backend(format!("I/O error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("entities/abc123");
        let msg = format!("{}", err);
        assert!(msg.contains("not_found"));
        assert!(msg.contains("entities/abc123"));
    }

    #[test]
    fn test_conflict_error() {
        let err = StorageError::conflict("Entity already exists: e1");
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(err.message, "Entity already exists: e1");
        assert!(err.source.is_none());
    }

    #[test]
    fn test_invalid_identifier_quotes_input() {
        let err = StorageError::invalid_identifier("a/b");
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
        assert!(err.message.contains("\"a/b\""));
    }

    #[test]
    fn test_error_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StorageError::backend("Failed to read content").with_source(io_err);

        assert_eq!(err.kind, ErrorKind::BackendFailure);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
        let err: StorageError = json_err.into();

        assert_eq!(err.kind, ErrorKind::BackendFailure);
        assert!(err.message.contains("JSON error"));
        assert!(err.source().is_some());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_rusqlite_error_conversion() {
        let sqlite_err = rusqlite::Error::QueryReturnedNoRows;
        let err: StorageError = sqlite_err.into();

        assert_eq!(err.kind, ErrorKind::BackendFailure);
        assert!(err.message.contains("SQLite error"));
    }

    #[test]
    fn test_error_kind_as_str() {
        assert_eq!(ErrorKind::InvalidIdentifier.as_str(), "invalid_identifier");
        assert_eq!(ErrorKind::Conflict.as_str(), "conflict");
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
        assert_eq!(ErrorKind::CorruptState.as_str(), "corrupt_state");
        assert_eq!(
            ErrorKind::UnsupportedMetadataPath.as_str(),
            "unsupported_metadata_path"
        );
        assert_eq!(ErrorKind::UnsupportedOperation.as_str(), "unsupported_operation");
        assert_eq!(ErrorKind::BackendFailure.as_str(), "backend_failure");
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        for kind in [
            ErrorKind::InvalidIdentifier,
            ErrorKind::Conflict,
            ErrorKind::UnsupportedMetadataPath,
        ] {
            assert!(kind.is_client_error());
            assert!(!kind.is_retryable());
        }
        assert!(!ErrorKind::CorruptState.is_retryable());
        assert!(!ErrorKind::CorruptState.is_client_error());
        assert!(ErrorKind::BackendFailure.is_retryable());
    }

    #[test]
    fn test_result_type_propagates() {
        fn inner() -> Result<u32> {
            Err(StorageError::corrupt_state("two current versions"))
        }
        fn outer() -> Result<u32> {
            let v = inner()?;
            Ok(v + 1)
        }

        let err = outer().unwrap_err();
        assert_eq!(err.kind, ErrorKind::CorruptState);
    }
}

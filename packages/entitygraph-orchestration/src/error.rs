use entitygraph_storage::{ErrorKind, StorageError};
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn serialization<E: std::fmt::Display>(e: E) -> Self {
        Self::Serialization(e.to_string())
    }

    /// Storage error kind seen by callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Storage(e) => e.kind(),
            IngestError::InvalidStateTransition { .. } | IngestError::Serialization(_) => {
                ErrorKind::CorruptState
            }
            IngestError::Config(_) | IngestError::Io(_) => ErrorKind::BackendFailure,
        }
    }
}

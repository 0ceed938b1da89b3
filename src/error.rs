//! Error types and handling for the upload file manager
//! Created: 2025-06-03 11:31:05 UTC

use std::{error::Error as StdError, io, result::Result as StdResult};

use thiserror::Error;

use crate::types::{WorkspaceId, WorkspaceState};

/// Custom result type for file manager operations
pub type Result<T> = StdResult<T, Error>;

/// Core error type for file manager operations.
///
/// Classification anomalies and provenance scan failures never surface here;
/// they become diagnostics and negative detector results respectively.
#[derive(Error, Debug)]
#[non_exhaustive]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Workspace {workspace} is busy or locked")]
    ConcurrencyConflict { workspace: WorkspaceId },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Upload workspace not found: {0}")]
    NotFound(WorkspaceId),

    #[error("Cannot {operation} workspace in state {state}")]
    InvalidTransition {
        state: WorkspaceState,
        operation: &'static str,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Internal error: {0}")]
    InternalError(#[source] Box<dyn StdError + Send + Sync>),
}

impl Error {
    /// Helper for creating an `InternalError` with a boxed source
    pub fn internal<E: StdError + Send + Sync + 'static>(e: E) -> Self {
        Error::InternalError(Box::new(e))
    }

    /// Only per-workspace contention is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::internal(err)
    }
}

// -------------------- Sub-Error Categories --------------------

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    #[error("Workspace record has no identifier")]
    MissingId,

    #[error("File area I/O failed for {path}: {source}")]
    FileArea {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ArchiveError {
    #[error("Unsupported archive format: {0}")]
    Unsupported(String),

    #[error("Corrupt archive: {0}")]
    Corrupt(String),
}

impl From<io::Error> for ArchiveError {
    fn from(err: io::Error) -> Self {
        ArchiveError::Corrupt(err.to_string())
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        ArchiveError::Corrupt(err.to_string())
    }
}

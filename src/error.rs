//! Error taxonomy for the import phases.
//!
//! None of these ever reach the bridge. Each phase logs what it hit and the
//! orchestrator moves on to the next phase.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Expected profile file is not there.
    #[error("source file not found: {0:?}")]
    MissingSource(PathBuf),

    /// File exists but cannot be opened or queried.
    #[error("failed to open {path:?}: {reason}")]
    OpenFailure { path: PathBuf, reason: String },

    /// JSON document is malformed or has an unexpected shape.
    #[error("failed to parse {path:?}: {reason}")]
    ParseFailure { path: PathBuf, reason: String },

    /// A single record could not be decoded; only that record is dropped.
    #[error("skipping record: {0}")]
    RecordDecodeFailure(String),

    /// The selected credential backend refused to initialize.
    #[error("password backend {backend} failed to initialize: {reason}")]
    BackendInitFailure { backend: String, reason: String },
}

impl ImportError {
    pub fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ImportError::OpenFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ImportError::ParseFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn backend_init(backend: impl Into<String>, reason: impl ToString) -> Self {
        ImportError::BackendInitFailure {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    /// Missing files are expected for partial profiles and only worth a debug line.
    pub fn is_missing_source(&self) -> bool {
        matches!(self, ImportError::MissingSource(_))
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

//! Error types for textscout.
//!
//! Only failures that a caller must act on are errors. Ordinary scan outcomes such as a
//! file exceeding the size ceiling, a file vanishing between discovery and decode, or a
//! permission problem are reported as data by the decoder (see
//! [`Decoded::Skipped`](crate::decoder::Decoded)) and never reach this enum.
//!
//! The variants are split by the stage that produced them so that a per-file failure in
//! a worker can be told apart from a resource problem or a configuration mistake:
//!
//! ```rust,ignore
//! match processor.process_file(path) {
//!     Ok(Some(file_result)) => // record hits,
//!     Ok(None) => // nothing found or file skipped,
//!     Err(SearchError::Io { path, source }) => // unexpected read failure,
//!     Err(SearchError::ResourceExhausted { .. }) => // buffer allocation failed,
//!     Err(e) => // anything else
//! }
//! ```
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for scan operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur while configuring or running a scan
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Root unavailable: {path}: {source}")]
    RootUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not allocate {bytes} bytes to read {path}")]
    ResourceExhausted { path: PathBuf, bytes: u64 },
    #[error("Worker panicked while scanning {path}: {message}")]
    TaskPanicked { path: PathBuf, message: String },
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
    #[error("Could not write report {path}: {message}")]
    Report { path: PathBuf, message: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SearchError {
    pub fn root_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RootUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn resource_exhausted(path: impl Into<PathBuf>, bytes: u64) -> Self {
        Self::ResourceExhausted {
            path: path.into(),
            bytes,
        }
    }

    pub fn task_panicked(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TaskPanicked {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    pub fn unknown_encoding(label: impl Into<String>) -> Self {
        Self::UnknownEncoding(label.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn report(path: &Path, msg: impl Into<String>) -> Self {
        Self::Report {
            path: path.to_path_buf(),
            message: msg.into(),
        }
    }

    /// The file this error is bound to, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::RootUnavailable { path, .. }
            | Self::Io { path, .. }
            | Self::ResourceExhausted { path, .. }
            | Self::TaskPanicked { path, .. }
            | Self::Report { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

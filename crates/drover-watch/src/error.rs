//! # Design
//!
//! - Constant-message errors with the operation and path kept as fields.
//! - Per-file parse failures are not errors here; they are logged and skipped by the scanner.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for watcher operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Errors that stop a directory watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Watched path exists but is not a directory.
    #[error("watch path is not a directory")]
    NotADirectory {
        /// Offending path.
        path: PathBuf,
    },
    /// IO failure while inspecting the watched directory.
    #[error("watch io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory listing failed.
    #[error("watch walkdir failure")]
    Walkdir {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Background scan task ended abnormally.
    #[error("watch task failed")]
    Task {
        /// Watched directory.
        path: PathBuf,
        /// Join failure detail.
        detail: String,
    },
}

impl WatchError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }
}

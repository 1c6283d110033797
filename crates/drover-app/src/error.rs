//! # Design
//!
//! - Centralize application-level errors for bootstrap and the event loop.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Flags or environment values were invalid.
    #[error("configuration invalid")]
    Config {
        /// Source configuration error.
        #[source]
        source: drover_config::ConfigError,
    },
    /// Telemetry setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        #[source]
        source: drover_telemetry::TelemetryError,
    },
    /// The transfer engine could not be started.
    #[error("transfer engine operation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        #[source]
        source: drover_core::TransferError,
    },
    /// The descriptor watcher failed to start or stopped with an error.
    #[error("descriptor watcher failed")]
    Watch {
        /// Operation identifier.
        operation: &'static str,
        /// Source watcher error.
        #[source]
        source: drover_watch::WatchError,
    },
    /// The descriptor stream ended without reporting an error.
    #[error("descriptor stream closed unexpectedly")]
    WatchStreamClosed,
    /// Status server operations failed.
    #[error("status server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        #[source]
        source: drover_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn telemetry(
        operation: &'static str,
        source: drover_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn engine(operation: &'static str, source: drover_core::TransferError) -> Self {
        Self::Engine { operation, source }
    }

    pub(crate) const fn watch(operation: &'static str, source: drover_watch::WatchError) -> Self {
        Self::Watch { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: drover_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    /// Process exit status for this failure. Every failure path exits with `1`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. }
            | Self::Telemetry { .. }
            | Self::Engine { .. }
            | Self::Watch { .. }
            | Self::WatchStreamClosed
            | Self::ApiServer { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn app_error_helpers_build_variants() {
        let engine = AppError::engine(
            "engine.new",
            drover_core::TransferError::StorageIo {
                operation: "engine.create_download_dir",
                path: PathBuf::from("/readonly"),
                source: io::Error::other("denied"),
            },
        );
        assert!(matches!(engine, AppError::Engine { .. }));
        assert!(engine.source().is_some());

        let watch = AppError::watch(
            "watch.spawn",
            drover_watch::WatchError::NotADirectory {
                path: PathBuf::from("/etc/hosts"),
            },
        );
        assert_eq!(watch.to_string(), "descriptor watcher failed");

        let api = AppError::api_server(
            "api.serve",
            drover_api::ApiServerError::Serve {
                source: io::Error::other("io"),
            },
        );
        assert!(matches!(api, AppError::ApiServer { .. }));
    }

    #[test]
    fn every_failure_exits_with_one() {
        let cases = [
            AppError::WatchStreamClosed,
            AppError::Config {
                source: drover_config::ConfigError::MissingHome,
            },
            AppError::engine(
                "engine.new",
                drover_core::TransferError::NotFound {
                    id: drover_core::ContentId::from_bytes([0; 20]),
                },
            ),
        ];
        for err in cases {
            assert_eq!(err.exit_code(), 1);
        }
    }
}

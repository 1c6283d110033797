//! # Design
//!
//! - Provide a single crate-level error type for status server bind/serve failures.
//! - Keep error messages constant; capture operational context in structured fields.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

/// Result alias for status server operations.
pub type ApiServerResult<T> = std::result::Result<T, ApiServerError>;

/// Errors raised while binding or serving the status surface.
#[derive(Debug)]
pub enum ApiServerError {
    /// Binding the listener failed.
    Bind {
        /// Address attempted.
        addr: SocketAddr,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Serving requests failed.
    Serve {
        /// Underlying IO error.
        source: std::io::Error,
    },
}

impl Display for ApiServerError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { .. } => formatter.write_str("failed to bind status listener"),
            Self::Serve { .. } => formatter.write_str("status server terminated unexpectedly"),
        }
    }
}

impl Error for ApiServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bind { source, .. } | Self::Serve { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn api_server_error_display_and_source() {
        let cases = [
            (
                ApiServerError::Bind {
                    addr: SocketAddr::from(([127, 0, 0, 1], 7070)),
                    source: io::Error::other("in use"),
                },
                "failed to bind status listener",
            ),
            (
                ApiServerError::Serve {
                    source: io::Error::other("reset"),
                },
                "status server terminated unexpectedly",
            ),
        ];
        for (err, message) in cases {
            assert_eq!(err.to_string(), message);
            assert!(err.source().is_some());
        }
    }
}

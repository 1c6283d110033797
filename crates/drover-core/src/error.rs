//! Error types for transfer sessions and descriptor parsing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::bencode::BencodeError;
use crate::model::ContentId;

/// Primary error type for transfer engine operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Descriptor file could not be read from disk.
    #[error("descriptor could not be read")]
    DescriptorIo {
        /// Descriptor path.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
    /// Descriptor bytes were not valid bencode.
    #[error("descriptor is not valid bencode")]
    Bencode {
        /// Decoder failure.
        #[source]
        source: BencodeError,
    },
    /// Descriptor decoded but violated a structural rule.
    #[error("invalid descriptor: {reason}")]
    InvalidDescriptor {
        /// Violated rule.
        reason: &'static str,
    },
    /// Magnet URI could not be interpreted.
    #[error("invalid magnet link: {reason}")]
    InvalidMagnet {
        /// Offending URI.
        uri: String,
        /// Violated rule.
        reason: &'static str,
    },
    /// Content identifier text was malformed.
    #[error("invalid content identifier")]
    InvalidContentId {
        /// Offending input.
        value: String,
    },
    /// Payload storage could not be accessed.
    #[error("storage operation failed")]
    StorageIo {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
    /// Session metadata is not yet known.
    #[error("session metadata unavailable")]
    MetadataUnavailable {
        /// Session identifier.
        id: ContentId,
    },
    /// Session was terminated and accepts no further work.
    #[error("session terminated")]
    Terminated {
        /// Session identifier.
        id: ContentId,
    },
    /// Session was not registered with the engine.
    #[error("session not found")]
    NotFound {
        /// Missing session identifier.
        id: ContentId,
    },
}

impl TransferError {
    pub(crate) const fn invalid(reason: &'static str) -> Self {
        Self::InvalidDescriptor { reason }
    }

    pub(crate) fn magnet(uri: &str, reason: &'static str) -> Self {
        Self::InvalidMagnet {
            uri: uri.to_string(),
            reason,
        }
    }
}

impl From<BencodeError> for TransferError {
    fn from(source: BencodeError) -> Self {
        Self::Bencode { source }
    }
}

/// Convenience alias for transfer operation results.
pub type TransferResult<T> = Result<T, TransferError>;

//! Core transfer domain types shared across the workspace.

mod id;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use id::ContentId;

/// Where a descriptor came from and how the engine should admit it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DescriptorSource {
    /// Metainfo (`.torrent`) file on disk.
    File {
        /// Path of the metainfo file.
        path: PathBuf,
    },
    /// Magnet URI carrying only the content identifier and hints.
    Uri {
        /// Magnet URI text.
        uri: String,
    },
}

impl DescriptorSource {
    /// Convenience constructor for file-backed descriptors.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// Convenience constructor for magnet descriptors.
    #[must_use]
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::Uri { uri: uri.into() }
    }

    /// Path of a file-backed descriptor.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path } => Some(path),
            Self::Uri { .. } => None,
        }
    }

    /// Whether the descriptor carries full metadata.
    #[must_use]
    pub const fn has_metadata(&self) -> bool {
        matches!(self, Self::File { .. })
    }
}

/// Change notification for the watched descriptor directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescriptorEvent {
    /// Descriptor appeared (or gained richer metadata).
    Added {
        /// Identifier derived from the descriptor.
        id: ContentId,
        /// Descriptor origin.
        source: DescriptorSource,
    },
    /// Descriptor for the identifier disappeared.
    Removed {
        /// Identifier that is no longer described.
        id: ContentId,
    },
}

impl DescriptorEvent {
    /// Identifier the event refers to.
    #[must_use]
    pub const fn id(&self) -> ContentId {
        match self {
            Self::Added { id, .. } | Self::Removed { id } => *id,
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Added { .. } => "added",
            Self::Removed { .. } => "removed",
        }
    }
}

/// Completion state of a single piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceState {
    /// Piece verified against its hash.
    Complete,
    /// Some bytes present but the piece is not verified.
    Partial,
    /// No bytes present.
    Absent,
}

impl PieceState {
    /// Single-letter code used in status dumps.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Complete => 'C',
            Self::Partial => 'P',
            Self::Absent => 'A',
        }
    }
}

/// Maximal run of consecutive pieces sharing a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceStateRun {
    /// Number of pieces in the run.
    pub length: usize,
    /// Shared state of those pieces.
    pub state: PieceState,
}

impl PieceStateRun {
    /// Whether the run's pieces are complete.
    #[must_use]
    pub fn complete(&self) -> bool {
        self.state == PieceState::Complete
    }

    /// Whether the run's pieces are partial.
    #[must_use]
    pub fn partial(&self) -> bool {
        self.state == PieceState::Partial
    }

    /// Run-length encode a sequence of piece states.
    pub fn encode(states: impl IntoIterator<Item = PieceState>) -> Vec<Self> {
        let mut runs: Vec<Self> = Vec::new();
        for state in states {
            match runs.last_mut() {
                Some(run) if run.state == state => run.length += 1,
                _ => runs.push(Self { length: 1, state }),
            }
        }
        runs
    }
}

/// Lifecycle phase reported for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Admitted from a magnet; metadata not yet known.
    AwaitingMetadata,
    /// Metadata known; full retrieval not yet requested.
    Idle,
    /// Full retrieval requested and content incomplete.
    Downloading,
    /// Full retrieval requested and content complete.
    Seeding,
    /// Session was terminated.
    Terminated,
}

impl SessionPhase {
    /// Label used in status dumps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingMetadata => "awaiting_metadata",
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Seeding => "seeding",
            Self::Terminated => "terminated",
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: ContentId,
    /// Display name; the hex identifier until metadata is known.
    pub name: String,
    /// Lifecycle phase.
    pub phase: SessionPhase,
    /// Verified bytes.
    pub bytes_completed: u64,
    /// Total content length; zero until metadata is known.
    pub total_length: u64,
    /// Number of pieces; zero until metadata is known.
    pub piece_count: usize,
    /// Run-length encoded piece states.
    pub piece_state_runs: Vec<PieceStateRun>,
    /// Whether metadata is known.
    pub metadata_ready: bool,
    /// Whether every piece is complete.
    pub fully_downloaded: bool,
    /// Announce URLs in effect.
    pub trackers: Vec<String>,
    /// Descriptor the session was admitted from.
    pub origin: DescriptorSource,
    /// Admission timestamp.
    pub added_at: DateTime<Utc>,
}

/// Resolution of a session's metadata readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataReadiness {
    /// Metadata became available.
    Ready,
    /// Session was terminated before metadata became available.
    Abandoned,
}

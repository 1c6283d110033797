//! Engine and session traits implemented by transfer adapters.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransferResult;
use crate::model::{
    ContentId, DescriptorSource, MetadataReadiness, PieceStateRun, SessionPhase, SessionSnapshot,
};

/// Shared handle to a session owned by an engine.
pub type SessionHandle = Arc<dyn TransferSession>;

/// A single content transfer tracked by an engine.
#[async_trait]
pub trait TransferSession: Send + Sync {
    /// Session identifier.
    fn id(&self) -> ContentId;

    /// Display name; the hex identifier until metadata is known.
    fn name(&self) -> String;

    /// Verified bytes.
    fn bytes_completed(&self) -> u64;

    /// Total content length; zero until metadata is known.
    fn total_length(&self) -> u64;

    /// Number of pieces; zero until metadata is known.
    fn piece_count(&self) -> usize;

    /// Run-length encoded piece states. Run lengths sum to [`Self::piece_count`].
    fn piece_state_runs(&self) -> Vec<PieceStateRun>;

    /// Whether every piece is complete.
    fn is_fully_downloaded(&self) -> bool;

    /// Resolve once metadata is available or the session is terminated.
    async fn metadata_ready(&self) -> MetadataReadiness;

    /// Request retrieval of the complete content.
    ///
    /// # Errors
    ///
    /// Fails when metadata is still missing or the session was terminated.
    fn fetch_all(&self) -> TransferResult<()>;

    /// Consistent view of the session taken under a single lock.
    fn snapshot(&self) -> SessionSnapshot;
}

/// Registry of sessions plus admission and termination.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Admit (or return the existing) session for a metainfo file.
    async fn add_metainfo_file(&self, path: &Path) -> TransferResult<SessionHandle>;

    /// Admit (or return the existing) session for a magnet URI.
    async fn add_magnet(&self, uri: &str) -> TransferResult<SessionHandle>;

    /// Find a session by identifier.
    async fn lookup(&self, id: ContentId) -> Option<SessionHandle>;

    /// Stop a session and release it from the registry. Downloaded data is left in place.
    async fn terminate(&self, session: SessionHandle) -> TransferResult<()>;

    /// Sessions in identifier order.
    async fn sessions(&self) -> Vec<SessionHandle>;

    /// Free-form diagnostic dump of engine state.
    async fn write_status(&self) -> String;

    /// Admit a session from whichever descriptor kind the source names.
    async fn add_descriptor(&self, source: &DescriptorSource) -> TransferResult<SessionHandle> {
        match source {
            DescriptorSource::File { path } => self.add_metainfo_file(path).await,
            DescriptorSource::Uri { uri } => self.add_magnet(uri).await,
        }
    }

    /// Snapshot every live session in identifier order.
    ///
    /// Sessions terminated after the listing was taken are left out.
    async fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.sessions()
            .await
            .iter()
            .map(|session| session.snapshot())
            .filter(|snapshot| snapshot.phase != SessionPhase::Terminated)
            .collect()
    }
}

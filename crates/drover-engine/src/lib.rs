#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Local transfer engine that tracks sessions and verifies payload data on disk.
//!
//! # Design
//! - Sessions live in an identifier-keyed registry; admission is idempotent per identifier.
//! - Metainfo admission verifies existing payload bytes on a blocking worker before the
//!   session is registered, so snapshots never show half-verified state.
//! - Magnet admissions stay pending until a metainfo descriptor for the same identifier is
//!   admitted; termination resolves pending readiness as abandoned.
//! - Termination never touches payload data.

mod registry;
/// Session implementation handed out by the engine.
pub mod session;
mod status;
/// Engine configuration types.
pub mod types;
mod verify;

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use drover_core::{
    ContentId, DescriptorSource, MagnetLink, Metainfo, PieceState, SessionHandle, TransferEngine,
    TransferError, TransferResult, TransferSession,
};
use tracing::{debug, info, warn};

use registry::SessionRegistry;
pub use session::LocalSession;
pub use types::{DEFAULT_READAHEAD_BYTES, EngineConfig};

/// Engine that admits descriptors and reports on payload stored under one directory.
#[derive(Debug)]
pub struct LocalEngine {
    config: EngineConfig,
    registry: SessionRegistry,
}

impl LocalEngine {
    /// Construct an engine, creating the download directory when missing.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::StorageIo`] if the download directory cannot be created.
    pub fn new(config: EngineConfig) -> TransferResult<Self> {
        std::fs::create_dir_all(&config.download_dir).map_err(|source| {
            TransferError::StorageIo {
                operation: "engine.create_download_dir",
                path: config.download_dir.clone(),
                source,
            }
        })?;
        info!(
            download_dir = %config.download_dir.display(),
            disable_trackers = config.disable_trackers,
            readahead_bytes = config.readahead_bytes,
            "local engine initialised"
        );
        Ok(Self {
            config,
            registry: SessionRegistry::default(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Terminate every session. Returns how many were released.
    pub async fn shutdown(&self) -> usize {
        let drained = self.registry.drain().await;
        for session in &drained {
            session.mark_terminated();
        }
        info!(sessions = drained.len(), "local engine shut down");
        drained.len()
    }

    async fn verify(&self, metainfo: Arc<Metainfo>) -> TransferResult<Vec<PieceState>> {
        let root = self.config.download_dir.clone();
        let readahead = self.config.readahead();
        let worker_root = root.clone();
        tokio::task::spawn_blocking(move || verify::scan(&worker_root, &metainfo, readahead))
            .await
            .map_err(|err| TransferError::StorageIo {
                operation: "engine.verify",
                path: root,
                source: io::Error::other(err),
            })
    }

    fn handle(session: Arc<LocalSession>) -> SessionHandle {
        session
    }
}

#[async_trait]
impl TransferEngine for LocalEngine {
    async fn add_metainfo_file(&self, path: &Path) -> TransferResult<SessionHandle> {
        let bytes =
            tokio::fs::read(path)
                .await
                .map_err(|source| TransferError::DescriptorIo {
                    path: path.to_path_buf(),
                    source,
                })?;
        let metainfo = Arc::new(Metainfo::from_bytes(&bytes)?);
        let id = metainfo.info_hash;
        let trackers = self.config.effective_trackers(&metainfo.trackers);
        let origin = DescriptorSource::file(path);

        if let Some(existing) = self.registry.get(&id).await {
            if existing.has_metainfo() {
                debug!(content_id = %id, path = %path.display(), "session already admitted");
                return Ok(Self::handle(existing));
            }
            let pieces = self.verify(Arc::clone(&metainfo)).await?;
            if existing.attach_metainfo(metainfo, pieces, trackers, origin) {
                info!(content_id = %id, name = %existing.name(), "metadata attached to pending session");
            }
            return Ok(Self::handle(existing));
        }

        let pieces = self.verify(Arc::clone(&metainfo)).await?;
        let session = Arc::new(LocalSession::with_metainfo(
            metainfo, pieces, trackers, origin,
        ));
        let (session, inserted) = self.registry.insert_or_get(session).await;
        if inserted {
            info!(
                content_id = %id,
                name = %session.name(),
                total_length = session.total_length(),
                bytes_completed = session.bytes_completed(),
                "session admitted from metainfo"
            );
        }
        Ok(Self::handle(session))
    }

    async fn add_magnet(&self, uri: &str) -> TransferResult<SessionHandle> {
        let link = MagnetLink::parse(uri)?;
        let id = link.info_hash;
        if let Some(existing) = self.registry.get(&id).await {
            debug!(content_id = %id, "session already admitted");
            return Ok(Self::handle(existing));
        }
        let session = Arc::new(LocalSession::awaiting_metadata(
            id,
            link.display_name,
            self.config.effective_trackers(&link.trackers),
            DescriptorSource::uri(uri),
        ));
        let (session, inserted) = self.registry.insert_or_get(session).await;
        if inserted {
            info!(content_id = %id, name = %session.name(), "session admitted from magnet");
        }
        Ok(Self::handle(session))
    }

    async fn lookup(&self, id: ContentId) -> Option<SessionHandle> {
        self.registry.get(&id).await.map(Self::handle)
    }

    async fn terminate(&self, session: SessionHandle) -> TransferResult<()> {
        let id = session.id();
        let registered = self
            .registry
            .get(&id)
            .await
            .ok_or(TransferError::NotFound { id })?;
        let same = Arc::as_ptr(&session).cast::<()>() == Arc::as_ptr(&registered).cast::<()>();
        if !same || !self.registry.remove_if_same(&id, &registered).await {
            warn!(content_id = %id, "terminate requested for a stale session handle");
            return Err(TransferError::NotFound { id });
        }
        registered.mark_terminated();
        info!(content_id = %id, "session terminated");
        Ok(())
    }

    async fn sessions(&self) -> Vec<SessionHandle> {
        self.registry
            .list()
            .await
            .into_iter()
            .map(Self::handle)
            .collect()
    }

    async fn write_status(&self) -> String {
        let snapshots = self.snapshots().await;
        status::render(&self.config, &snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::{MetadataReadiness, PieceStateRun, SessionPhase};
    use drover_test_support::fixtures::{MetainfoFixture, magnet_uri};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        _temp: TempDir,
        descriptors: std::path::PathBuf,
        engine: LocalEngine,
    }

    fn harness(disable_trackers: bool) -> anyhow::Result<Harness> {
        let temp = tempfile::tempdir()?;
        let descriptors = temp.path().join("descriptors");
        std::fs::create_dir_all(&descriptors)?;
        let mut config = EngineConfig::new(temp.path().join("data"));
        config.disable_trackers = disable_trackers;
        let engine = LocalEngine::new(config)?;
        Ok(Harness {
            _temp: temp,
            descriptors,
            engine,
        })
    }

    #[tokio::test]
    async fn new_creates_download_dir() -> anyhow::Result<()> {
        let h = harness(false)?;
        assert!(h.engine.config().download_dir.is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn new_fails_when_download_dir_is_a_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"x")?;
        let result = LocalEngine::new(EngineConfig::new(blocker.join("data")));
        assert!(matches!(result, Err(TransferError::StorageIo { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn metainfo_admission_verifies_existing_payload() -> anyhow::Result<()> {
        let h = harness(false)?;
        let fixture = MetainfoFixture::single("movie.bin", vec![3_u8; 40]).tracker("udp://t");
        fixture.write_payload(&h.engine.config().download_dir)?;
        let path = fixture.write_descriptor(&h.descriptors, "movie.torrent")?;

        let session = h.engine.add_metainfo_file(&path).await?;
        assert_eq!(session.id(), fixture.content_id());
        assert!(session.is_fully_downloaded());
        assert_eq!(session.bytes_completed(), 40);
        assert_eq!(session.metadata_ready().await, MetadataReadiness::Ready);
        session.fetch_all()?;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Seeding);
        assert_eq!(snapshot.trackers, vec!["udp://t".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_admission_returns_the_same_session() -> anyhow::Result<()> {
        let h = harness(false)?;
        let fixture = MetainfoFixture::single("a.bin", vec![1_u8; 20]);
        let path = fixture.write_descriptor(&h.descriptors, "a.torrent")?;
        let first = h.engine.add_metainfo_file(&path).await?;
        let second = h.engine.add_metainfo_file(&path).await?;
        assert_eq!(
            Arc::as_ptr(&first).cast::<()>(),
            Arc::as_ptr(&second).cast::<()>()
        );
        assert_eq!(h.engine.sessions().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn disabled_trackers_strip_announce_urls() -> anyhow::Result<()> {
        let h = harness(true)?;
        let fixture = MetainfoFixture::single("b.bin", vec![1_u8; 20]).tracker("udp://t");
        let path = fixture.write_descriptor(&h.descriptors, "b.torrent")?;
        let session = h.engine.add_metainfo_file(&path).await?;
        assert!(session.snapshot().trackers.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn magnet_session_completes_when_metainfo_arrives() -> anyhow::Result<()> {
        let h = harness(false)?;
        let fixture = MetainfoFixture::single("show.mkv", vec![5_u8; 30]);
        let magnet = h
            .engine
            .add_magnet(&magnet_uri(fixture.content_id(), Some("Show")))
            .await?;
        assert_eq!(magnet.name(), "Show");
        assert_eq!(magnet.piece_count(), 0);
        assert!(matches!(
            magnet.fetch_all(),
            Err(TransferError::MetadataUnavailable { .. })
        ));

        let waiter = {
            let magnet = Arc::clone(&magnet);
            tokio::spawn(async move { magnet.metadata_ready().await })
        };
        let path = fixture.write_descriptor(&h.descriptors, "show.torrent")?;
        let attached = h.engine.add_metainfo_file(&path).await?;
        assert_eq!(attached.id(), magnet.id());
        let readiness = tokio::time::timeout(Duration::from_secs(1), waiter).await??;
        assert_eq!(readiness, MetadataReadiness::Ready);
        assert_eq!(magnet.name(), "show.mkv");
        assert_eq!(magnet.piece_count(), 2);
        magnet.fetch_all()?;
        assert_eq!(magnet.snapshot().phase, SessionPhase::Downloading);
        Ok(())
    }

    fn assert_piece_accounting(session: &SessionHandle) {
        let runs = session.piece_state_runs();
        assert_eq!(
            runs.iter().map(|run| run.length).sum::<usize>(),
            session.piece_count()
        );
        assert!(runs.iter().all(|run| run.length > 0));
        assert!(runs.iter().all(|run| !(run.complete() && run.partial())));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.piece_state_runs, runs);
        assert_eq!(snapshot.piece_count, session.piece_count());
    }

    #[tokio::test]
    async fn upgraded_magnet_runs_cover_every_piece() -> anyhow::Result<()> {
        let h = harness(false)?;
        let fixture = MetainfoFixture::single("clip.bin", vec![6_u8; 40]);
        fixture.write_payload(&h.engine.config().download_dir)?;
        std::fs::write(
            h.engine.config().download_dir.join("clip.bin"),
            vec![6_u8; 20],
        )?;
        let magnet = h
            .engine
            .add_magnet(&magnet_uri(fixture.content_id(), None))
            .await?;
        assert_piece_accounting(&magnet);
        assert!(magnet.piece_state_runs().is_empty());

        let path = fixture.write_descriptor(&h.descriptors, "clip.torrent")?;
        h.engine.add_metainfo_file(&path).await?;
        assert_piece_accounting(&magnet);
        assert_eq!(
            magnet.piece_state_runs(),
            vec![
                PieceStateRun { length: 1, state: PieceState::Complete },
                PieceStateRun { length: 1, state: PieceState::Partial },
                PieceStateRun { length: 1, state: PieceState::Absent },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn multi_file_runs_cover_every_piece() -> anyhow::Result<()> {
        let h = harness(false)?;
        let fixture = MetainfoFixture::multi("album")
            .file(&["one"], vec![1_u8; 10])
            .file(&["two"], vec![2_u8; 10])
            .file(&["three"], vec![3_u8; 28]);
        fixture.write_payload(&h.engine.config().download_dir)?;
        std::fs::remove_file(h.engine.config().download_dir.join("album").join("three"))?;
        let path = fixture.write_descriptor(&h.descriptors, "album.torrent")?;
        let session = h.engine.add_metainfo_file(&path).await?;
        assert_piece_accounting(&session);
        assert_eq!(session.piece_count(), 3);
        assert_eq!(
            session.piece_state_runs(),
            vec![
                PieceStateRun { length: 1, state: PieceState::Complete },
                PieceStateRun { length: 1, state: PieceState::Partial },
                PieceStateRun { length: 1, state: PieceState::Absent },
            ]
        );
        assert_eq!(session.bytes_completed(), 16);
        Ok(())
    }

    #[tokio::test]
    async fn terminate_releases_session_and_keeps_payload() -> anyhow::Result<()> {
        let h = harness(false)?;
        let fixture = MetainfoFixture::single("keep.bin", vec![8_u8; 16]);
        fixture.write_payload(&h.engine.config().download_dir)?;
        let path = fixture.write_descriptor(&h.descriptors, "keep.torrent")?;
        let session = h.engine.add_metainfo_file(&path).await?;

        h.engine.terminate(Arc::clone(&session)).await?;
        assert!(h.engine.lookup(fixture.content_id()).await.is_none());
        assert!(h.engine.config().download_dir.join("keep.bin").is_file());
        assert!(matches!(
            session.fetch_all(),
            Err(TransferError::Terminated { .. })
        ));
        assert!(matches!(
            h.engine.terminate(session).await,
            Err(TransferError::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn snapshots_skip_sessions_terminated_after_listing() -> anyhow::Result<()> {
        let h = harness(false)?;
        let live = MetainfoFixture::single("live.bin", vec![1_u8; 16]);
        let gone = MetainfoFixture::single("gone.bin", vec![2_u8; 16]);
        h.engine
            .add_metainfo_file(&live.write_descriptor(&h.descriptors, "live.torrent")?)
            .await?;
        h.engine
            .add_metainfo_file(&gone.write_descriptor(&h.descriptors, "gone.torrent")?)
            .await?;
        let registered = h
            .engine
            .registry
            .get(&gone.content_id())
            .await
            .ok_or_else(|| anyhow::anyhow!("session should be registered"))?;
        registered.mark_terminated();

        assert_eq!(h.engine.sessions().await.len(), 2);
        let snapshots = h.engine.snapshots().await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, live.content_id());
        assert!(!h.engine.write_status().await.contains("gone.bin"));
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_abandons_pending_magnets() -> anyhow::Result<()> {
        let h = harness(false)?;
        let fixture = MetainfoFixture::single("late.bin", vec![1_u8; 16]);
        let session = h
            .engine
            .add_magnet(&magnet_uri(fixture.content_id(), None))
            .await?;
        assert_eq!(h.engine.shutdown().await, 1);
        let readiness =
            tokio::time::timeout(Duration::from_secs(1), session.metadata_ready()).await?;
        assert_eq!(readiness, MetadataReadiness::Abandoned);
        assert!(h.engine.sessions().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_descriptors_are_rejected() -> anyhow::Result<()> {
        let h = harness(false)?;
        let path = h.descriptors.join("junk.torrent");
        std::fs::write(&path, b"garbage")?;
        assert!(h.engine.add_metainfo_file(&path).await.is_err());
        assert!(
            h.engine
                .add_metainfo_file(&h.descriptors.join("missing.torrent"))
                .await
                .is_err()
        );
        assert!(h.engine.add_magnet("magnet:?dn=nohash").await.is_err());
        assert!(h.engine.sessions().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn status_dump_lists_sessions_in_identifier_order() -> anyhow::Result<()> {
        let h = harness(false)?;
        let a = MetainfoFixture::single("a.bin", vec![1_u8; 16]);
        let b = MetainfoFixture::single("b.bin", vec![2_u8; 16]);
        h.engine
            .add_metainfo_file(&a.write_descriptor(&h.descriptors, "a.torrent")?)
            .await?;
        h.engine
            .add_metainfo_file(&b.write_descriptor(&h.descriptors, "b.torrent")?)
            .await?;
        let text = h.engine.write_status().await;
        assert!(text.contains("sessions: 2\n"));
        let mut ids = vec![a.content_id(), b.content_id()];
        ids.sort();
        let first = text.find(&ids[0].to_string());
        let second = text.find(&ids[1].to_string());
        assert!(first.is_some() && first < second);
        assert!(text.contains("pieces: 1 [1A]"));
        Ok(())
    }
}

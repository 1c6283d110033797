//! Session state owned by the local engine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drover_core::{
    ContentId, DescriptorSource, MetadataReadiness, Metainfo, PieceState, PieceStateRun,
    SessionPhase, SessionSnapshot, TransferError, TransferResult, TransferSession,
};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Pending,
    Ready,
    Abandoned,
}

#[derive(Debug)]
struct SessionState {
    name: String,
    metainfo: Option<Arc<Metainfo>>,
    pieces: Vec<PieceState>,
    trackers: Vec<String>,
    origin: DescriptorSource,
    fetch_requested: bool,
    terminated: bool,
}

impl SessionState {
    fn all_complete(&self) -> bool {
        self.metainfo.is_some() && self.pieces.iter().all(|state| *state == PieceState::Complete)
    }

    fn bytes_completed(&self) -> u64 {
        let Some(meta) = &self.metainfo else {
            return 0;
        };
        self.pieces
            .iter()
            .enumerate()
            .filter(|(_, state)| **state == PieceState::Complete)
            .map(|(index, _)| meta.piece_size(index))
            .sum()
    }

    fn phase(&self) -> SessionPhase {
        if self.terminated {
            SessionPhase::Terminated
        } else if self.metainfo.is_none() {
            SessionPhase::AwaitingMetadata
        } else if !self.fetch_requested {
            SessionPhase::Idle
        } else if self.all_complete() {
            SessionPhase::Seeding
        } else {
            SessionPhase::Downloading
        }
    }
}

/// Session tracked by [`crate::LocalEngine`].
#[derive(Debug)]
pub struct LocalSession {
    id: ContentId,
    added_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    readiness: watch::Sender<Readiness>,
}

impl LocalSession {
    /// Session whose metadata and on-disk state are already known.
    pub(crate) fn with_metainfo(
        metainfo: Arc<Metainfo>,
        pieces: Vec<PieceState>,
        trackers: Vec<String>,
        origin: DescriptorSource,
    ) -> Self {
        Self {
            id: metainfo.info_hash,
            added_at: Utc::now(),
            state: Mutex::new(SessionState {
                name: metainfo.name.clone(),
                metainfo: Some(metainfo),
                pieces,
                trackers,
                origin,
                fetch_requested: false,
                terminated: false,
            }),
            readiness: watch::Sender::new(Readiness::Ready),
        }
    }

    /// Session admitted from a magnet link; metadata arrives later.
    pub(crate) fn awaiting_metadata(
        id: ContentId,
        display_name: Option<String>,
        trackers: Vec<String>,
        origin: DescriptorSource,
    ) -> Self {
        Self {
            id,
            added_at: Utc::now(),
            state: Mutex::new(SessionState {
                name: display_name.unwrap_or_else(|| id.to_string()),
                metainfo: None,
                pieces: Vec::new(),
                trackers,
                origin,
                fetch_requested: false,
                terminated: false,
            }),
            readiness: watch::Sender::new(Readiness::Pending),
        }
    }

    /// Whether metadata is known.
    pub(crate) fn has_metainfo(&self) -> bool {
        self.lock().metainfo.is_some()
    }

    /// Complete a pending session with metadata and its verified piece states.
    ///
    /// Returns `false` when the session already had metadata or was terminated.
    pub(crate) fn attach_metainfo(
        &self,
        metainfo: Arc<Metainfo>,
        pieces: Vec<PieceState>,
        trackers: Vec<String>,
        origin: DescriptorSource,
    ) -> bool {
        {
            let mut state = self.lock();
            if state.metainfo.is_some() || state.terminated {
                return false;
            }
            state.name.clone_from(&metainfo.name);
            state.metainfo = Some(metainfo);
            state.pieces = pieces;
            for tracker in trackers {
                if !state.trackers.contains(&tracker) {
                    state.trackers.push(tracker);
                }
            }
            state.origin = origin;
        }
        self.readiness.send_replace(Readiness::Ready);
        true
    }

    /// Stop the session; pending readiness waiters resolve as abandoned.
    pub(crate) fn mark_terminated(&self) {
        self.lock().terminated = true;
        self.readiness.send_if_modified(|readiness| {
            if *readiness == Readiness::Pending {
                *readiness = Readiness::Abandoned;
                true
            } else {
                false
            }
        });
    }

    /// Tracker list currently in effect.
    pub(crate) fn trackers(&self) -> Vec<String> {
        self.lock().trackers.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TransferSession for LocalSession {
    fn id(&self) -> ContentId {
        self.id
    }

    fn name(&self) -> String {
        self.lock().name.clone()
    }

    fn bytes_completed(&self) -> u64 {
        self.lock().bytes_completed()
    }

    fn total_length(&self) -> u64 {
        self.lock()
            .metainfo
            .as_ref()
            .map_or(0, |meta| meta.total_length())
    }

    fn piece_count(&self) -> usize {
        self.lock().pieces.len()
    }

    fn piece_state_runs(&self) -> Vec<PieceStateRun> {
        PieceStateRun::encode(self.lock().pieces.iter().copied())
    }

    fn is_fully_downloaded(&self) -> bool {
        self.lock().all_complete()
    }

    async fn metadata_ready(&self) -> MetadataReadiness {
        let mut rx = self.readiness.subscribe();
        let resolved = match rx.wait_for(|readiness| *readiness != Readiness::Pending).await {
            Ok(readiness) => *readiness,
            Err(_) => Readiness::Abandoned,
        };
        match resolved {
            Readiness::Ready => MetadataReadiness::Ready,
            Readiness::Pending | Readiness::Abandoned => MetadataReadiness::Abandoned,
        }
    }

    fn fetch_all(&self) -> TransferResult<()> {
        let mut state = self.lock();
        if state.terminated {
            return Err(TransferError::Terminated { id: self.id });
        }
        if state.metainfo.is_none() {
            return Err(TransferError::MetadataUnavailable { id: self.id });
        }
        state.fetch_requested = true;
        Ok(())
    }

    fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            id: self.id,
            name: state.name.clone(),
            phase: state.phase(),
            bytes_completed: state.bytes_completed(),
            total_length: state
                .metainfo
                .as_ref()
                .map_or(0, |meta| meta.total_length()),
            piece_count: state.pieces.len(),
            piece_state_runs: PieceStateRun::encode(state.pieces.iter().copied()),
            metadata_ready: state.metainfo.is_some(),
            fully_downloaded: state.all_complete(),
            trackers: state.trackers.clone(),
            origin: state.origin.clone(),
            added_at: self.added_at,
        }
    }
}

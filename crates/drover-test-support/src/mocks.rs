//! In-memory engine that records calls and lets tests drive readiness.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drover_core::{
    ContentId, DescriptorSource, MetadataReadiness, PieceState, PieceStateRun, SessionHandle,
    SessionPhase, SessionSnapshot, TransferEngine, TransferError, TransferResult,
    TransferSession,
};
use tokio::sync::watch;

/// Engine call observed by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `add_metainfo_file` with the given path.
    AddFile(PathBuf),
    /// `add_magnet` with the given URI.
    AddMagnet(String),
    /// `lookup` for the identifier.
    Lookup(ContentId),
    /// `terminate` for the identifier.
    Terminate(ContentId),
}

/// Shape of a session the engine hands out for a registered descriptor.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// Session identifier.
    pub id: ContentId,
    /// Display name.
    pub name: String,
    /// Piece states, one per piece.
    pub pieces: Vec<PieceState>,
    /// Bytes per piece.
    pub piece_length: u64,
    /// Whether metadata is available at admission.
    pub metadata_ready: bool,
}

impl SessionSpec {
    /// Spec with no pieces whose metadata is pending.
    #[must_use]
    pub fn pending(id: ContentId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            pieces: Vec::new(),
            piece_length: 0,
            metadata_ready: false,
        }
    }

    /// Spec with metadata ready and the given piece states.
    #[must_use]
    pub fn ready(id: ContentId, name: &str, pieces: Vec<PieceState>, piece_length: u64) -> Self {
        Self {
            id,
            name: name.to_string(),
            pieces,
            piece_length,
            metadata_ready: true,
        }
    }
}

/// Session produced by [`RecordingEngine`].
#[derive(Debug)]
pub struct RecordingSession {
    spec: SessionSpec,
    origin: DescriptorSource,
    added_at: DateTime<Utc>,
    readiness: watch::Sender<Option<MetadataReadiness>>,
    fetches: watch::Sender<usize>,
    terminated: AtomicBool,
}

impl RecordingSession {
    fn new(spec: SessionSpec, origin: DescriptorSource) -> Self {
        let initial = spec.metadata_ready.then_some(MetadataReadiness::Ready);
        Self {
            spec,
            origin,
            added_at: Utc::now(),
            readiness: watch::Sender::new(initial),
            fetches: watch::Sender::new(0),
            terminated: AtomicBool::new(false),
        }
    }

    /// Make metadata available, waking any waiter.
    pub fn release_metadata(&self) {
        self.readiness.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(MetadataReadiness::Ready);
                true
            } else {
                false
            }
        });
    }

    /// Number of successful `fetch_all` calls.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        *self.fetches.borrow()
    }

    /// Wait until at least `count` fetches happened, or the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns an error when the timeout elapses first.
    pub async fn wait_for_fetches(&self, count: usize, limit: Duration) -> anyhow::Result<()> {
        let mut rx = self.fetches.subscribe();
        tokio::time::timeout(limit, rx.wait_for(|seen| *seen >= count))
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for {count} fetches"))?
            .map_err(|_| anyhow::anyhow!("fetch channel closed"))?;
        Ok(())
    }

    /// Whether the engine terminated this session.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        self.readiness.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(MetadataReadiness::Abandoned);
                true
            } else {
                false
            }
        });
    }

    fn metadata_known(&self) -> bool {
        self.readiness.borrow().is_some_and(|state| state == MetadataReadiness::Ready)
    }
}

#[async_trait]
impl TransferSession for RecordingSession {
    fn id(&self) -> ContentId {
        self.spec.id
    }

    fn name(&self) -> String {
        self.spec.name.clone()
    }

    fn bytes_completed(&self) -> u64 {
        let complete = self
            .spec
            .pieces
            .iter()
            .filter(|state| **state == PieceState::Complete)
            .count();
        complete as u64 * self.spec.piece_length
    }

    fn total_length(&self) -> u64 {
        self.spec.pieces.len() as u64 * self.spec.piece_length
    }

    fn piece_count(&self) -> usize {
        self.spec.pieces.len()
    }

    fn piece_state_runs(&self) -> Vec<PieceStateRun> {
        PieceStateRun::encode(self.spec.pieces.iter().copied())
    }

    fn is_fully_downloaded(&self) -> bool {
        self.metadata_known()
            && self
                .spec
                .pieces
                .iter()
                .all(|state| *state == PieceState::Complete)
    }

    async fn metadata_ready(&self) -> MetadataReadiness {
        let mut rx = self.readiness.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(state) => state.unwrap_or(MetadataReadiness::Abandoned),
            Err(_) => MetadataReadiness::Abandoned,
        }
    }

    fn fetch_all(&self) -> TransferResult<()> {
        if self.is_terminated() {
            return Err(TransferError::Terminated { id: self.spec.id });
        }
        if !self.metadata_known() {
            return Err(TransferError::MetadataUnavailable { id: self.spec.id });
        }
        self.fetches.send_modify(|count| *count += 1);
        Ok(())
    }

    fn snapshot(&self) -> SessionSnapshot {
        let metadata_ready = self.metadata_known();
        let phase = if self.is_terminated() {
            SessionPhase::Terminated
        } else if !metadata_ready {
            SessionPhase::AwaitingMetadata
        } else if self.fetch_calls() == 0 {
            SessionPhase::Idle
        } else if self.is_fully_downloaded() {
            SessionPhase::Seeding
        } else {
            SessionPhase::Downloading
        };
        SessionSnapshot {
            id: self.spec.id,
            name: self.name(),
            phase,
            bytes_completed: self.bytes_completed(),
            total_length: self.total_length(),
            piece_count: self.piece_count(),
            piece_state_runs: self.piece_state_runs(),
            metadata_ready,
            fully_downloaded: self.is_fully_downloaded(),
            trackers: Vec::new(),
            origin: self.origin.clone(),
            added_at: self.added_at,
        }
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    specs: HashMap<DescriptorSource, SessionSpec>,
    sessions: BTreeMap<ContentId, Arc<RecordingSession>>,
    calls: Vec<EngineCall>,
}

/// Engine fake whose admissions are scripted per descriptor source.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    state: Mutex<RecordingState>,
}

impl RecordingEngine {
    /// Empty engine with no scripted descriptors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the session handed out when `source` is admitted. Unscripted sources fail.
    pub fn script(&self, source: DescriptorSource, spec: SessionSpec) {
        self.lock().specs.insert(source, spec);
    }

    /// Register a session directly, bypassing admission.
    pub fn insert(&self, spec: SessionSpec) -> Arc<RecordingSession> {
        let session = Arc::new(RecordingSession::new(
            spec,
            DescriptorSource::uri("magnet:?inserted"),
        ));
        self.lock().sessions.insert(session.spec.id, Arc::clone(&session));
        session
    }

    /// Calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Registered session for `id`.
    #[must_use]
    pub fn session(&self, id: ContentId) -> Option<Arc<RecordingSession>> {
        self.lock().sessions.get(&id).cloned()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn admit(&self, source: DescriptorSource, call: EngineCall) -> TransferResult<SessionHandle> {
        let mut state = self.lock();
        state.calls.push(call);
        let spec = state
            .specs
            .get(&source)
            .cloned()
            .ok_or(TransferError::InvalidDescriptor {
                reason: "unscripted descriptor",
            })?;
        let session = state
            .sessions
            .entry(spec.id)
            .or_insert_with(|| Arc::new(RecordingSession::new(spec, source)));
        let handle: SessionHandle = Arc::clone(session) as SessionHandle;
        Ok(handle)
    }
}

#[async_trait]
impl TransferEngine for RecordingEngine {
    async fn add_metainfo_file(&self, path: &Path) -> TransferResult<SessionHandle> {
        self.admit(
            DescriptorSource::file(path),
            EngineCall::AddFile(path.to_path_buf()),
        )
    }

    async fn add_magnet(&self, uri: &str) -> TransferResult<SessionHandle> {
        self.admit(
            DescriptorSource::uri(uri),
            EngineCall::AddMagnet(uri.to_string()),
        )
    }

    async fn lookup(&self, id: ContentId) -> Option<SessionHandle> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Lookup(id));
        state
            .sessions
            .get(&id)
            .map(|session| Arc::clone(session) as SessionHandle)
    }

    async fn terminate(&self, session: SessionHandle) -> TransferResult<()> {
        let id = session.id();
        let removed = {
            let mut state = self.lock();
            state.calls.push(EngineCall::Terminate(id));
            state.sessions.remove(&id)
        };
        let removed = removed.ok_or(TransferError::NotFound { id })?;
        removed.terminate();
        Ok(())
    }

    async fn sessions(&self) -> Vec<SessionHandle> {
        self.lock()
            .sessions
            .values()
            .map(|session| Arc::clone(session) as SessionHandle)
            .collect()
    }

    async fn write_status(&self) -> String {
        let state = self.lock();
        let mut out = format!("recording engine: {} sessions\n", state.sessions.len());
        for id in state.sessions.keys() {
            out.push_str(&format!("{id}\n"));
        }
        out
    }
}

impl RecordingEngine {
    /// Terminate every session, as engine shutdown would.
    pub fn shutdown(&self) {
        let drained: Vec<Arc<RecordingSession>> = {
            let mut state = self.lock();
            std::mem::take(&mut state.sessions).into_values().collect()
        };
        for session in drained {
            session.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admission_is_idempotent_per_identifier() -> anyhow::Result<()> {
        let engine = RecordingEngine::new();
        let id = crate::fixtures::content_id(1);
        engine.script(
            DescriptorSource::uri("magnet:?a"),
            SessionSpec::pending(id, "a"),
        );
        let first = engine.add_magnet("magnet:?a").await?;
        let second = engine.add_magnet("magnet:?a").await?;
        assert_eq!(first.id(), second.id());
        assert_eq!(engine.session_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn terminate_abandons_pending_readiness() -> anyhow::Result<()> {
        let engine = RecordingEngine::new();
        let id = crate::fixtures::content_id(2);
        let session = engine.insert(SessionSpec::pending(id, "b"));
        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.metadata_ready().await })
        };
        engine.terminate(session as SessionHandle).await?;
        assert_eq!(waiter.await?, MetadataReadiness::Abandoned);
        Ok(())
    }

    #[tokio::test]
    async fn unscripted_sources_fail() {
        let engine = RecordingEngine::new();
        assert!(engine.add_metainfo_file(Path::new("/nope.torrent")).await.is_err());
        assert_eq!(
            engine.calls(),
            vec![EngineCall::AddFile(PathBuf::from("/nope.torrent"))]
        );
    }
}

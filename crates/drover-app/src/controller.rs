//! Session lifecycle controller: reconciles descriptor events with engine sessions.
//!
//! # Design
//! - Events are handled strictly one at a time on the caller's task; an add always completes
//!   before a later removal of the same id is looked at.
//! - Each session gets at most one fetch trigger. The trigger waits on the session's metadata
//!   signal, so a terminated session resolves its trigger as abandoned instead of leaking it.
//! - Triggers run on a `JoinSet` owned by the controller; the event loop reaps them between
//!   events and never waits on one.
//! - Engine failures for a single descriptor are logged and counted, never propagated.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use drover_core::{
    ContentId, DescriptorEvent, DescriptorSource, MetadataReadiness, SessionHandle,
    TransferEngine, TransferError,
};
use drover_telemetry::Metrics;
use drover_watch::WatchResult;
use tokio::task::{JoinError, JoinSet};
use tokio_stream::{Stream, StreamExt};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::{AppError, AppResult};

/// How an add event affected fetch scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// A new trigger task was started.
    Scheduled,
    /// A trigger for this session already exists.
    AlreadyPending,
    /// The session was complete at admission.
    NotNeeded,
}

/// Result of handling one descriptor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The engine admitted (or returned the existing) session.
    Attached {
        /// Session identifier.
        id: ContentId,
        /// Fetch scheduling decision.
        plan: FetchPlan,
    },
    /// The engine rejected the descriptor.
    AddFailed {
        /// Identifier carried by the event.
        id: ContentId,
    },
    /// The session was terminated.
    Terminated {
        /// Session identifier.
        id: ContentId,
    },
    /// No session existed for the removed identifier.
    UnknownRemoval {
        /// Identifier carried by the event.
        id: ContentId,
    },
    /// The engine failed to terminate the session.
    RemoveFailed {
        /// Session identifier.
        id: ContentId,
    },
}

/// How a fetch trigger finished.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Metadata became available and the fetch was requested.
    Fetched,
    /// The session was torn down before the fetch could be requested.
    Abandoned,
    /// The engine refused the fetch.
    Failed {
        /// Engine error.
        error: TransferError,
    },
}

impl FetchOutcome {
    /// Metrics label for the outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Abandoned => "abandoned",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Completed fetch trigger.
#[derive(Debug)]
pub struct FetchReport {
    /// Session the trigger belonged to.
    pub id: ContentId,
    /// How it finished.
    pub outcome: FetchOutcome,
}

/// Single-consumer reconciler between the descriptor stream and the transfer engine.
pub struct SessionController {
    engine: Arc<dyn TransferEngine>,
    metrics: Metrics,
    tasks: JoinSet<FetchReport>,
    triggered: HashSet<ContentId>,
}

impl SessionController {
    /// Controller over `engine`, reporting into `metrics`.
    #[must_use]
    pub fn new(engine: Arc<dyn TransferEngine>, metrics: Metrics) -> Self {
        Self {
            engine,
            metrics,
            tasks: JoinSet::new(),
            triggered: HashSet::new(),
        }
    }

    /// Fetch triggers that have not been reaped yet.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Consume `events` until `shutdown` resolves or the stream fails.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Watch`] when the stream yields an error and
    /// [`AppError::WatchStreamClosed`] when it ends.
    pub async fn run<S, F>(&mut self, mut events: S, shutdown: F) -> AppResult<()>
    where
        S: Stream<Item = WatchResult<DescriptorEvent>> + Unpin,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("session controller running");
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(pending = self.tasks.len(), "shutdown requested");
                    return Ok(());
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.reap(joined);
                }
                item = events.next() => match item {
                    Some(Ok(event)) => {
                        self.handle_event(event).await;
                    }
                    Some(Err(source)) => {
                        return Err(AppError::watch("watch.stream", source));
                    }
                    None => return Err(AppError::WatchStreamClosed),
                },
            }
        }
    }

    /// Apply a single descriptor event to the engine.
    pub async fn handle_event(&mut self, event: DescriptorEvent) -> EventOutcome {
        self.metrics.inc_descriptor_event(event.kind());
        let outcome = match event {
            DescriptorEvent::Added { id, source } => self.add(id, &source).await,
            DescriptorEvent::Removed { id } => self.remove(id).await,
        };
        self.refresh_gauges().await;
        outcome
    }

    /// Wait for the next fetch trigger to finish. `None` when no trigger is outstanding.
    pub async fn next_report(&mut self) -> Option<FetchReport> {
        loop {
            let joined = self.tasks.join_next().await?;
            if let Some(report) = self.reap(joined) {
                return Some(report);
            }
        }
    }

    /// Drain outstanding triggers, aborting whatever is still running after `limit`.
    ///
    /// Call after the engine has terminated its sessions so every trigger can resolve.
    pub async fn wait_for_tasks(&mut self, limit: Duration) -> usize {
        let mut drained = 0;
        let drain = async {
            while self.next_report().await.is_some() {
                drained += 1;
            }
        };
        if tokio::time::timeout(limit, drain).await.is_err() {
            warn!(
                remaining = self.tasks.len(),
                "fetch triggers still running at shutdown; aborting"
            );
            self.tasks.abort_all();
        }
        self.metrics.set_pending_fetch_tasks(self.tasks.len());
        drained
    }

    async fn add(&mut self, id: ContentId, source: &DescriptorSource) -> EventOutcome {
        let session = match self.engine.add_descriptor(source).await {
            Ok(session) => session,
            Err(err) => {
                self.metrics.inc_session_operation("add", "error");
                warn!(content_id = %id, source = ?source, error = %err, "failed to add descriptor");
                return EventOutcome::AddFailed { id };
            }
        };
        self.metrics.inc_session_operation("add", "ok");
        let session_id = session.id();
        if session_id != id {
            warn!(
                content_id = %id,
                session_id = %session_id,
                "engine admitted descriptor under a different identifier"
            );
        }
        let plan = self.plan_fetch(session);
        info!(content_id = %session_id, plan = ?plan, "session attached");
        EventOutcome::Attached {
            id: session_id,
            plan,
        }
    }

    fn plan_fetch(&mut self, session: SessionHandle) -> FetchPlan {
        if session.is_fully_downloaded() {
            return FetchPlan::NotNeeded;
        }
        let id = session.id();
        if !self.triggered.insert(id) {
            return FetchPlan::AlreadyPending;
        }
        self.tasks.spawn(
            trigger_fetch(session).instrument(info_span!("fetch_trigger", content_id = %id)),
        );
        FetchPlan::Scheduled
    }

    async fn remove(&mut self, id: ContentId) -> EventOutcome {
        self.triggered.remove(&id);
        let Some(session) = self.engine.lookup(id).await else {
            debug!(content_id = %id, "removal for unknown session ignored");
            return EventOutcome::UnknownRemoval { id };
        };
        match self.engine.terminate(session).await {
            Ok(()) => {
                self.metrics.inc_session_operation("terminate", "ok");
                info!(content_id = %id, "session terminated");
                EventOutcome::Terminated { id }
            }
            Err(TransferError::NotFound { .. }) => {
                debug!(content_id = %id, "session vanished before termination");
                EventOutcome::UnknownRemoval { id }
            }
            Err(err) => {
                self.metrics.inc_session_operation("terminate", "error");
                warn!(content_id = %id, error = %err, "failed to terminate session");
                EventOutcome::RemoveFailed { id }
            }
        }
    }

    fn reap(&self, joined: Result<FetchReport, JoinError>) -> Option<FetchReport> {
        self.metrics.set_pending_fetch_tasks(self.tasks.len());
        let report = match joined {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "fetch trigger task did not complete");
                return None;
            }
        };
        self.metrics
            .inc_session_operation("fetch", report.outcome.label());
        match &report.outcome {
            FetchOutcome::Fetched => info!(content_id = %report.id, "fetch requested"),
            FetchOutcome::Abandoned => {
                debug!(content_id = %report.id, "fetch trigger abandoned");
            }
            FetchOutcome::Failed { error } => {
                warn!(content_id = %report.id, error = %error, "fetch request failed");
            }
        }
        Some(report)
    }

    async fn refresh_gauges(&self) {
        self.metrics
            .set_active_sessions(self.engine.sessions().await.len());
        self.metrics.set_pending_fetch_tasks(self.tasks.len());
    }
}

async fn trigger_fetch(session: SessionHandle) -> FetchReport {
    let id = session.id();
    let outcome = match session.metadata_ready().await {
        MetadataReadiness::Abandoned => FetchOutcome::Abandoned,
        MetadataReadiness::Ready => match session.fetch_all() {
            Ok(()) => FetchOutcome::Fetched,
            Err(TransferError::Terminated { .. }) => FetchOutcome::Abandoned,
            Err(error) => FetchOutcome::Failed { error },
        },
    };
    FetchReport { id, outcome }
}

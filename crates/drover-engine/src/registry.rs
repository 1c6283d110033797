//! Identifier-keyed session registry.

use std::collections::HashMap;
use std::sync::Arc;

use drover_core::{ContentId, TransferSession};
use tokio::sync::RwLock;

use crate::session::LocalSession;

/// Registry of live sessions.
#[derive(Debug, Default)]
pub(crate) struct SessionRegistry {
    entries: RwLock<HashMap<ContentId, Arc<LocalSession>>>,
}

impl SessionRegistry {
    pub(crate) async fn get(&self, id: &ContentId) -> Option<Arc<LocalSession>> {
        self.entries.read().await.get(id).cloned()
    }

    /// Insert `session` unless one is already registered; returns the winner and whether
    /// the insert happened.
    pub(crate) async fn insert_or_get(
        &self,
        session: Arc<LocalSession>,
    ) -> (Arc<LocalSession>, bool) {
        let mut entries = self.entries.write().await;
        let id = session.id();
        if let Some(existing) = entries.get(&id) {
            return (Arc::clone(existing), false);
        }
        entries.insert(id, Arc::clone(&session));
        (session, true)
    }

    /// Remove only if the registered session is this exact instance.
    pub(crate) async fn remove_if_same(&self, id: &ContentId, session: &Arc<LocalSession>) -> bool {
        let mut entries = self.entries.write().await;
        if entries
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            entries.remove(id);
            true
        } else {
            false
        }
    }

    /// Sessions sorted by identifier, collected under one read lock.
    pub(crate) async fn list(&self) -> Vec<Arc<LocalSession>> {
        let entries = self.entries.read().await;
        let mut sessions: Vec<(ContentId, Arc<LocalSession>)> = entries
            .iter()
            .map(|(id, session)| (*id, Arc::clone(session)))
            .collect();
        drop(entries);
        sessions.sort_by_key(|(id, _)| *id);
        sessions.into_iter().map(|(_, session)| session).collect()
    }

    pub(crate) async fn drain(&self) -> Vec<Arc<LocalSession>> {
        self.entries.write().await.drain().map(|(_, session)| session).collect()
    }
}

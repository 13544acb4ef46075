//! Process-wide table of live sessions.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::GatewayError;
use crate::session::{session_id, Session, SessionId};

/// Owns the mapping from session ID to session.
///
/// This is the only place sessions are created or removed. All operations are
/// safe to call concurrently; a long-running command on one session never
/// holds anything here.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh ID, build the session for it and store it.
    ///
    /// `build` runs while the slot is reserved and must not call back into
    /// the manager.
    pub fn register<F>(&self, build: F) -> Arc<Session>
    where
        F: FnOnce(SessionId) -> Session,
    {
        loop {
            let id = session_id();
            if let Entry::Vacant(slot) = self.sessions.entry(id.clone()) {
                let session = Arc::new(build(id));
                slot.insert(Arc::clone(&session));
                info!(session_id = %session.id(), "session registered");
                return session;
            }
        }
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<Session>, GatewayError> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GatewayError::SessionNotFound(id.into()))
    }

    /// Remove a session from the table. Removing an absent ID is a no-op.
    pub fn unregister(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(id).map(|(_, session)| session);
        if removed.is_some() {
            debug!(session_id = %id, "session unregistered");
        }
        removed
    }

    /// Tear a session down: Open → Closing → Closed.
    ///
    /// Disconnects, explicit closes and shutdown may race here; only the first
    /// caller performs the teardown and gets `true`.
    pub fn close(&self, id: &str) -> bool {
        let Ok(session) = self.lookup(id) else {
            return false;
        };
        if !session.begin_close() {
            return false;
        }
        self.unregister(id);
        session.finish_close();
        info!(session_id = %id, "session closed");
        true
    }

    /// Close every live session, returning how many were torn down here.
    pub fn close_all(&self) -> usize {
        self.ids().iter().filter(|id| self.close(id)).count()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

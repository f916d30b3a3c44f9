//! Core session manager structure and registration
//!
//! Provides the main `SessionManager` struct, session lookup and lazy
//! creation.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use crate::error::Result;
use crate::session::ProcessSession;
use crate::types::events::{ManagerEvent, SessionEvent};
use crate::types::identifiers::SessionId;
use crate::types::options::SessionOptions;

use super::super::config::ManagerConfig;
use super::super::helpers::fan_out_sink;
use super::super::table::{ManagedSession, SessionTable};

// ============================================================================
// SESSION MANAGER CORE
// ============================================================================

/// Manager for many concurrent Process Sessions
///
/// The `SessionManager` coordinates sessions keyed by external id:
/// - Lazy creation on first use
/// - Rekeying when the engine assigns a different canonical id
/// - Event fan-out under each session's current id
/// - Disposal of single sessions or all of them
///
/// Failures while sending a user message are reported as events, not
/// returned; direct calls such as [`SessionManager::create_session`] return
/// errors.
pub struct SessionManager {
    pub(super) config: ManagerConfig,
    pub(super) table: Mutex<SessionTable>,
    pub(super) events: broadcast::Sender<ManagerEvent>,
}

impl SessionManager {
    /// Create a manager
    ///
    /// # Errors
    /// Returns error if the configuration is invalid
    pub fn new(config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            config,
            table: Mutex::new(SessionTable::default()),
            events,
        })
    }

    /// Configuration this manager was built with
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Return the session known as `session_id`, creating it if needed
    ///
    /// `options` only apply when a new session is created; `None` uses the
    /// configured defaults. No process is launched until the session is
    /// first used.
    pub fn get_or_create(
        &self,
        session_id: &SessionId,
        options: Option<SessionOptions>,
    ) -> ProcessSession {
        self.entry_for(session_id, options).session.clone()
    }

    /// The session known as `session_id`, following rekeys
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<ProcessSession> {
        self.table
            .lock()
            .resolve(session_id)
            .map(|entry| entry.session.clone())
    }

    /// Current id of the session known as `session_id`
    ///
    /// Returns the canonical id for an id that was rekeyed away.
    #[must_use]
    pub fn resolve_id(&self, session_id: &SessionId) -> Option<SessionId> {
        self.table.lock().canonical_id(session_id)
    }

    /// Ids of all registered sessions
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.table.lock().ids()
    }

    /// Number of registered sessions
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.table.lock().len()
    }

    pub(super) fn entry_for(
        &self,
        session_id: &SessionId,
        options: Option<SessionOptions>,
    ) -> Arc<ManagedSession> {
        let mut table = self.table.lock();
        if let Some(entry) = table.resolve(session_id) {
            return entry;
        }

        let id_cell = Arc::new(RwLock::new(session_id.clone()));
        let session = ProcessSession::builder(Arc::clone(&self.config.launcher))
            .options(options.unwrap_or_else(|| self.config.session_defaults.clone()))
            .event_sink(fan_out_sink(Arc::clone(&id_cell), self.events.clone()))
            .diagnostics(self.config.diagnostics.clone())
            .build();
        let entry = Arc::new(ManagedSession { id_cell, session });
        table.insert(session_id.clone(), Arc::clone(&entry));
        log::debug!("Registered session {session_id}");
        entry
    }

    pub(super) fn emit(&self, session_id: SessionId, event: SessionEvent) {
        let _ = self.events.send(ManagerEvent { session_id, event });
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let entries = self.table.get_mut().drain();
        for entry in entries {
            entry.session.close();
        }
    }
}

//! Session interaction methods
//!
//! Handles interrupts, settings updates, inbound request answers and
//! disposal.

use serde_json::Value;

use crate::error::{DroidError, Result};
use crate::session::ProcessSession;
use crate::types::identifiers::{RequestId, SessionId};
use crate::types::settings::SessionSettings;

use super::core::SessionManager;

impl SessionManager {
    /// Interrupt the current turn of a session
    ///
    /// Returns `false` if no session is known under `session_id`.
    pub async fn cancel(&self, session_id: &SessionId) -> bool {
        let Some(session) = self.session(session_id) else {
            return false;
        };
        session.interrupt().await;
        true
    }

    /// Answer an inbound request of a session
    ///
    /// # Errors
    /// Returns error if the session is unknown or has no running process
    pub fn respond(&self, session_id: &SessionId, request_id: &RequestId, result: Value) -> Result<()> {
        self.require(session_id)?.respond_to(request_id, result)
    }

    /// Apply a settings patch to a session
    ///
    /// # Errors
    /// Returns error if the session is unknown, not initialized, or the
    /// engine rejects the patch
    pub async fn update_settings(&self, session_id: &SessionId, patch: &SessionSettings) -> Result<()> {
        self.require(session_id)?.update_settings(patch).await
    }

    /// Kill a session's process and forget the session
    ///
    /// The session is closed: a send already holding it fails instead of
    /// relaunching the process. Returns `false` if no session is known under `session_id`.
    pub fn dispose_session(&self, session_id: &SessionId) -> bool {
        let removed = self.table.lock().remove(session_id);
        match removed {
            Some(entry) => {
                log::debug!("Disposing session {}", entry.current_id());
                entry.session.close();
                true
            }
            None => false,
        }
    }

    /// Dispose every session, returning how many there were
    pub fn dispose_all_sessions(&self) -> usize {
        let entries = self.table.lock().drain();
        for entry in &entries {
            entry.session.close();
        }
        if !entries.is_empty() {
            log::info!("Disposed {} session(s)", entries.len());
        }
        entries.len()
    }

    fn require(&self, session_id: &SessionId) -> Result<ProcessSession> {
        self.session(session_id)
            .ok_or_else(|| DroidError::session_not_found(session_id.as_str()))
    }
}

//! User messages and session creation
//!
//! Handles the full send path: initialize or resume, rekey, apply
//! settings, submit the message.

use std::sync::Arc;

use crate::error::Result;
use crate::session::{InitSource, ProcessSession};
use crate::types::events::SessionEvent;
use crate::types::identifiers::SessionId;
use crate::types::options::SessionOptions;
use crate::types::settings::SessionSettings;

use super::super::table::{ManagedSession, Rekey};
use super::core::SessionManager;

/// Turn-ended code synthesized when sending fails
const SEND_FAILED: i32 = 1;

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Request parameters for sending a user message
#[derive(Debug, Clone)]
pub struct UserMessageRequest {
    /// Id the caller knows the session under
    pub session_id: SessionId,
    /// Message text
    pub text: String,
    /// Optional client-side message id
    pub message_id: Option<String>,
    /// Settings to apply before the message; `None` uses the defaults
    pub settings: Option<SessionSettings>,
    /// Options for a newly created session; `None` uses the defaults
    pub options: Option<SessionOptions>,
}

impl UserMessageRequest {
    /// Message for `session_id` with default settings and options
    pub fn new(session_id: impl Into<SessionId>, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            text: text.into(),
            message_id: None,
            settings: None,
            options: None,
        }
    }

    /// Attach a client-side message id
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Apply these settings before sending
    #[must_use]
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Use these options if the session has to be created
    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = Some(options);
        self
    }
}

// ============================================================================
// SEND IMPLEMENTATION
// ============================================================================

impl SessionManager {
    /// Send a user message, creating and initializing the session if needed
    ///
    /// Never fails: any error is reported as [`SessionEvent::Error`]
    /// followed by [`SessionEvent::TurnEnded`] with a non-zero code, under
    /// the session's id after any rekey.
    pub async fn send_user_message(&self, request: UserMessageRequest) {
        let UserMessageRequest {
            session_id,
            text,
            message_id,
            settings,
            options,
        } = request;
        let entry = self.entry_for(&session_id, options);
        let settings = settings.unwrap_or_else(|| self.config.default_settings.clone());

        if let Err(e) = self
            .deliver(&entry, &text, message_id.as_deref(), &settings)
            .await
        {
            let current = entry.current_id();
            log::warn!("Failed to send message to session {current}: {e}");
            self.emit(
                current.clone(),
                SessionEvent::Error {
                    message: e.to_string(),
                },
            );
            self.emit(current, SessionEvent::TurnEnded { code: SEND_FAILED });
        }
    }

    async fn deliver(
        &self,
        entry: &Arc<ManagedSession>,
        text: &str,
        message_id: Option<&str>,
        settings: &SessionSettings,
    ) -> Result<()> {
        let requested = entry.current_id();
        let outcome = entry
            .session
            .ensure_initialized(settings, Some(&requested))
            .await?;
        if outcome.source != InitSource::ResumeInPlace {
            log::debug!(
                "Session {requested} initialized as {} ({:?})",
                outcome.session_id,
                outcome.source
            );
        }
        // A concurrent send may already have rekeyed this entry.
        if outcome.session_id != entry.current_id() {
            self.rekey(entry, &outcome.session_id);
        }

        entry.session.update_settings(settings).await?;
        entry.session.add_user_message(text, message_id).await
    }

    fn rekey(&self, entry: &Arc<ManagedSession>, canonical: &SessionId) {
        let outcome = self.table.lock().rekey(entry, canonical);
        match outcome {
            Rekey::Moved {
                previous,
                displaced,
            } => {
                if let Some(displaced) = displaced {
                    log::warn!("Replacing session already registered as {canonical}");
                    displaced.session.close();
                }
                log::info!("Session {previous} is now known as {canonical}");
                self.emit(
                    canonical.clone(),
                    SessionEvent::SessionIdReplaced {
                        previous,
                        current: canonical.clone(),
                    },
                );
            }
            Rekey::Unchanged => {}
            Rekey::Stale => {
                log::debug!("Session became {canonical} after it was removed; not rekeying");
            }
        }
    }

    /// Obtain a fresh canonical session id without registering a session
    ///
    /// A throwaway process is started, initialized and disposed.
    ///
    /// # Errors
    /// Returns error if the process cannot be started or initialization
    /// fails
    pub async fn create_session(
        &self,
        settings: Option<SessionSettings>,
        options: Option<SessionOptions>,
    ) -> Result<SessionId> {
        let placeholder = SessionId::placeholder();
        let label = placeholder.clone();
        let session = ProcessSession::builder(Arc::clone(&self.config.launcher))
            .options(options.unwrap_or_else(|| self.config.session_defaults.clone()))
            .event_sink(Arc::new(move |event: SessionEvent| {
                log::trace!("[{label}] {event:?}");
            }))
            .diagnostics(self.config.diagnostics.clone())
            .build();

        let settings = settings.unwrap_or_else(|| self.config.default_settings.clone());
        let outcome = session.ensure_initialized(&settings, None).await;
        session.dispose();

        let outcome = outcome?;
        log::debug!("Created session {} via {placeholder}", outcome.session_id);
        Ok(outcome.session_id)
    }
}

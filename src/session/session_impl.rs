//! `ProcessSession` lifecycle and request API

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tokio::sync::{mpsc, oneshot};

use super::pending::PendingRequest;
use super::state::{InitOutcome, InitSource, SessionPhase};
use super::{ProcessSession, SessionInner, tasks};
use crate::diagnostics::{self, DiagnosticRecord, Direction};
use crate::error::{DroidError, Result};
use crate::protocol::{ProtocolMessage, methods};
use crate::transport::ProcessIo;
use crate::types::events::SessionEvent;
use crate::types::identifiers::{RequestId, SessionId};
use crate::types::options::SessionOptions;
use crate::types::settings::{AutonomyLevel, SessionSettings};

impl ProcessSession {
    /// Launch the engine process
    ///
    /// Does nothing if a process is already running. Must be called from
    /// within a Tokio runtime.
    ///
    /// # Errors
    /// Returns error if the session was closed, or the executable cannot
    /// be resolved or spawned
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if state.closed {
            return Err(DroidError::SessionClosed);
        }
        if state.phase.is_running() {
            return Ok(());
        }

        let ProcessIo {
            stdin,
            stdout,
            stderr,
            process,
        } = inner.launcher.launch(&inner.options)?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();
        state.generation += 1;
        state.phase = SessionPhase::Starting;
        state.outbound = Some(outbound_tx);
        state.kill_tx = Some(kill_tx);
        state.pid = process.id();
        state.autonomy_level = None;
        let generation = state.generation;
        let pid = state.pid;
        drop(state);

        log::info!("Started droid process (pid {pid:?}, generation {generation})");

        tokio::spawn(tasks::writer_task(stdin, outbound_rx));
        if let Some(stderr) = stderr {
            tokio::spawn(tasks::stderr_task(Arc::downgrade(inner), stderr));
        }
        tokio::spawn(tasks::io_loop(
            Arc::downgrade(inner),
            generation,
            stdout,
            process,
            kill_rx,
        ));
        Ok(())
    }

    /// Make sure the engine has a session, initializing or resuming one
    ///
    /// If the session is already initialized, its id is returned without
    /// contacting the engine. Otherwise the process is started and
    /// `initialize_session` is sent. When `resume` names a different,
    /// well-formed session id, `load_session` is attempted; a failed resume
    /// falls back to the fresh session instead of failing.
    ///
    /// # Errors
    /// Returns error if the process cannot be started, `initialize_session`
    /// fails or returns no session id, or the process exits meanwhile
    pub async fn ensure_initialized(
        &self,
        settings: &SessionSettings,
        resume: Option<&SessionId>,
    ) -> Result<InitOutcome> {
        let inner = &self.inner;
        let _init = inner.init_lock.lock().await;

        if let Some(session_id) = self.session_id() {
            return Ok(InitOutcome {
                session_id,
                source: InitSource::ResumeInPlace,
            });
        }

        self.start()?;
        let generation = inner.state.lock().generation;

        let mut params = settings.to_params();
        params.insert("machineId".to_string(), json!(inner.options.machine_id));
        params.insert(
            "cwd".to_string(),
            json!(inner.options.cwd.display().to_string()),
        );
        let result = inner
            .request(methods::INITIALIZE_SESSION, Value::Object(params))
            .await?;
        let fresh = result
            .get("sessionId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(SessionId::new)
            .ok_or(DroidError::MissingSessionId)?;

        let (session_id, source) = match resume.filter(|prior| **prior != fresh) {
            None => (fresh, InitSource::Init),
            Some(prior) if !prior.is_canonical() => {
                log::info!("Not resuming malformed session id {prior}; using {fresh}");
                (fresh, InitSource::ResumeInvalid)
            }
            Some(prior) => {
                match inner
                    .request(methods::LOAD_SESSION, json!({ "sessionId": prior.as_str() }))
                    .await
                {
                    Ok(_) => (prior.clone(), InitSource::Resume),
                    Err(e) => {
                        log::warn!("Failed to resume session {prior}, continuing with {fresh}: {e}");
                        (fresh, InitSource::ResumeFailed)
                    }
                }
            }
        };

        {
            let mut state = inner.state.lock();
            if state.generation != generation || !state.phase.is_running() {
                let exit_code = match state.phase {
                    SessionPhase::Terminated { exit_code } => exit_code,
                    _ => None,
                };
                return Err(DroidError::process_exited(exit_code));
            }
            state.phase = SessionPhase::Idle {
                session_id: session_id.clone(),
            };
            state.autonomy_level = settings.autonomy_level;
        }

        log::info!("Session {session_id} ready ({source:?})");
        Ok(InitOutcome { session_id, source })
    }

    /// Send a settings patch to the engine
    ///
    /// # Errors
    /// Returns error if the session is not initialized or the engine
    /// rejects the patch
    pub async fn update_settings(&self, patch: &SessionSettings) -> Result<()> {
        self.require_initialized()?;
        self.inner
            .request(
                methods::UPDATE_SESSION_SETTINGS,
                Value::Object(patch.to_params()),
            )
            .await?;
        if let Some(level) = patch.autonomy_level {
            self.inner.state.lock().autonomy_level = Some(level);
        }
        Ok(())
    }

    /// Submit user input, starting a turn
    ///
    /// The turn is marked active before the request is sent and stays active
    /// if the request fails; the engine's error notification or the process
    /// exit ends it.
    ///
    /// # Errors
    /// Returns error if the session is not initialized or the engine
    /// rejects the message
    pub async fn add_user_message(&self, text: &str, message_id: Option<&str>) -> Result<()> {
        let started = {
            let mut state = self.inner.state.lock();
            if state.phase.session_id().is_none() {
                return Err(DroidError::NotInitialized);
            }
            state.phase.begin_turn()
        };
        if started {
            self.inner.emit(SessionEvent::TurnStarted);
        }

        let mut params = Map::new();
        params.insert("text".to_string(), json!(text));
        if let Some(message_id) = message_id {
            params.insert("messageId".to_string(), json!(message_id));
        }
        self.inner
            .request(methods::ADD_USER_MESSAGE, Value::Object(params))
            .await?;
        Ok(())
    }

    /// Ask the engine to stop the current turn
    ///
    /// Advisory and best effort; failures are logged, never returned.
    pub async fn interrupt(&self) {
        if !self.phase().is_running() {
            return;
        }
        if let Err(e) = self
            .inner
            .request(methods::INTERRUPT_SESSION, json!({}))
            .await
        {
            log::debug!("interrupt_session failed: {e}");
        }
    }

    /// Answer an inbound request
    ///
    /// The response is queued for the engine's stdin; no acknowledgement is
    /// awaited.
    ///
    /// # Errors
    /// Returns error if no process is running
    pub fn respond_to(&self, request_id: &RequestId, result: Value) -> Result<()> {
        let message = ProtocolMessage::response(request_id.clone(), result);
        let line = message.to_line()?;
        diagnostics::record(self.inner.diagnostics.as_ref(), || {
            DiagnosticRecord::new(
                Direction::OutboundResponse,
                None,
                Some(request_id),
                &message.to_value(),
            )
        });
        self.inner.send_line(line)
    }

    /// Kill the process and reset the session
    ///
    /// Outstanding requests are rejected once the process has actually
    /// exited, so this is safe to call mid-request.
    pub fn dispose(&self) {
        let kill_tx = self.inner.state.lock().detach(SessionPhase::Unstarted);
        if let Some(kill_tx) = kill_tx {
            log::debug!("Disposing droid process");
            let _ = kill_tx.send(());
        }
    }

    /// Dispose the session for good
    ///
    /// Like [`ProcessSession::dispose`], but later calls to `start` (and so
    /// `ensure_initialized`) fail with [`DroidError::SessionClosed`] instead
    /// of launching a new process. Callers already waiting to initialize
    /// get that error too.
    pub fn close(&self) {
        let kill_tx = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.detach(SessionPhase::Unstarted)
        };
        if let Some(kill_tx) = kill_tx {
            log::debug!("Closing droid process");
            let _ = kill_tx.send(());
        }
    }

    /// Whether [`ProcessSession::close`] was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock().phase.clone()
    }

    /// Canonical session id, once initialized
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.state.lock().phase.session_id().cloned()
    }

    /// Whether the engine has a session
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session_id().is_some()
    }

    /// Whether a turn is running
    #[must_use]
    pub fn is_turn_active(&self) -> bool {
        self.inner.state.lock().phase.is_turn_active()
    }

    /// Interaction mode negotiated at init or changed since
    #[must_use]
    pub fn autonomy_level(&self) -> Option<AutonomyLevel> {
        self.inner.state.lock().autonomy_level
    }

    /// OS process id of the running engine
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.inner.state.lock().pid
    }

    /// Number of requests awaiting a response
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Options this session launches with
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    fn require_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(DroidError::NotInitialized)
        }
    }
}

impl SessionInner {
    /// Send a request and wait for its result
    pub(super) async fn request(self: &Arc<Self>, method: &str, params: Value) -> Result<Value> {
        let (tx, rx) = oneshot::channel();

        // Sequence numbers are taken under the state lock so that write
        // order matches sequence order.
        let (id, message) = {
            let state = self.state.lock();
            let Some(outbound) = state.outbound.as_ref() else {
                return Err(DroidError::transport("droid process is not running"));
            };
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            let id = RequestId::from_sequence(seq);
            let message = ProtocolMessage::request(id.clone(), method, Some(params));
            let line = message.to_line()?;

            self.pending
                .lock()
                .insert(id.clone(), PendingRequest::new(method, seq, state.generation, tx));
            if outbound.send(line).is_err() {
                self.pending.lock().take(&id);
                return Err(DroidError::transport("droid stdin is closed"));
            }
            (id, message)
        };

        diagnostics::record(self.diagnostics.as_ref(), || {
            DiagnosticRecord::new(
                Direction::OutboundRequest,
                Some(method),
                Some(&id),
                &message.to_value(),
            )
        });
        log::debug!("Sent {method} as {id}");

        let timeout = self.options.request_timeout;
        let weak = Arc::downgrade(self);
        let timer_id = id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(&timer_id, timeout);
            }
        });
        self.pending.lock().set_timer(&id, timer.abort_handle());

        match rx.await {
            Ok(outcome) => outcome?.into_result(method),
            Err(_) => Err(DroidError::transport(format!(
                "{method} was abandoned before completion"
            ))),
        }
    }

    fn expire(&self, id: &RequestId, after: Duration) {
        let Some(entry) = self.pending.lock().take(id) else {
            return;
        };
        log::warn!("{} ({id}) timed out after {after:?}", entry.method);
        let error = DroidError::timeout(entry.method.clone(), after);
        entry.settle(Err(error));
    }

    fn send_line(&self, line: String) -> Result<()> {
        let state = self.state.lock();
        let outbound = state
            .outbound
            .as_ref()
            .ok_or_else(|| DroidError::transport("droid process is not running"))?;
        outbound
            .send(line)
            .map_err(|_| DroidError::transport("droid stdin is closed"))
    }
}

//! Process Session: one engine process driving one conversation
//!
//! A [`ProcessSession`] owns at most one running `droid` process at a time.
//! It correlates outbound requests with their responses, tracks whether a
//! turn is running from the engine's working-state notifications, and
//! reports everything it observes to a single [`EventSink`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        ProcessSession                          │
//! │                                                                │
//! │  request() ──▶ PendingTable ◀── dispatch ◀── LineParser        │
//! │      │             ▲                             ▲             │
//! │      ▼             │ timeout                     │ stdout      │
//! │  outbound tx ──▶ Writer Task ──▶ stdin     I/O Loop Task       │
//! │                                              │ exit ──▶ reject │
//! │                                  stderr ──▶ Stderr Task        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - The writer task is the only place that touches the process's stdin
//! - The I/O loop is the only place that reads stdout; it also waits for the
//!   process to exit and then settles everything still outstanding
//! - Locks are synchronous and never held across an `.await`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kodegen_droid_agent::{
//!     ProcessSession, SessionEvent, SessionOptions, SessionSettings, SubprocessLauncher,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = ProcessSession::builder(Arc::new(SubprocessLauncher::new()))
//!     .options(SessionOptions::builder().cwd("/tmp/project").build())
//!     .event_sink(Arc::new(|event: SessionEvent| {
//!         if let Some(text) = event.assistant_text() {
//!             print!("{text}");
//!         }
//!     }))
//!     .build();
//!
//! let outcome = session
//!     .ensure_initialized(&SessionSettings::default(), None)
//!     .await?;
//! println!("session {}", outcome.session_id);
//!
//! session.add_user_message("List the files here", None).await?;
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod pending;
mod session_impl;
mod state;
mod tasks;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use parking_lot::Mutex;

use crate::diagnostics::DiagnosticsSink;
use crate::transport::Launcher;
use crate::types::events::{EventSink, SessionEvent};
use crate::types::options::SessionOptions;

pub use state::{InitOutcome, InitSource, SessionPhase};

use pending::PendingTable;
use state::ProcessState;

/// Handle to a Process Session
///
/// Cloning is cheap; all clones drive the same process. When the last
/// handle is dropped the process is killed.
#[derive(Clone)]
pub struct ProcessSession {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    options: SessionOptions,
    launcher: Arc<dyn Launcher>,
    sink: EventSink,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
    state: Mutex<ProcessState>,
    pending: Mutex<PendingTable>,
    /// Request sequence; never reset so ids stay unique across restarts
    next_seq: AtomicU64,
    /// Serializes `ensure_initialized`
    init_lock: tokio::sync::Mutex<()>,
}

impl SessionInner {
    fn emit(&self, event: SessionEvent) {
        (self.sink)(event);
    }
}

impl std::fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ProcessSession")
            .field("phase", &state.phase)
            .field("pid", &state.pid)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ProcessSession`]
pub struct ProcessSessionBuilder {
    launcher: Arc<dyn Launcher>,
    options: SessionOptions,
    sink: Option<EventSink>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl ProcessSessionBuilder {
    /// Set the session options
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the callback receiving every session event
    #[must_use]
    pub fn event_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Record protocol traffic to a diagnostics sink
    #[must_use]
    pub fn diagnostics(mut self, diagnostics: Option<Arc<dyn DiagnosticsSink>>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Build the session; no process is launched yet
    #[must_use]
    pub fn build(self) -> ProcessSession {
        let sink = self.sink.unwrap_or_else(|| {
            Arc::new(|event: SessionEvent| log::trace!("Unobserved session event: {event:?}"))
        });
        ProcessSession {
            inner: Arc::new(SessionInner {
                options: self.options,
                launcher: self.launcher,
                sink,
                diagnostics: self.diagnostics,
                state: Mutex::new(ProcessState::new()),
                pending: Mutex::new(PendingTable::default()),
                next_seq: AtomicU64::new(1),
                init_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

impl ProcessSession {
    /// Start building a session on top of `launcher`
    #[must_use]
    pub fn builder(launcher: Arc<dyn Launcher>) -> ProcessSessionBuilder {
        ProcessSessionBuilder {
            launcher,
            options: SessionOptions::default(),
            sink: None,
            diagnostics: None,
        }
    }

    /// Create a session with the given options and event sink
    #[must_use]
    pub fn new(launcher: Arc<dyn Launcher>, options: SessionOptions, sink: EventSink) -> Self {
        Self::builder(launcher)
            .options(options)
            .event_sink(sink)
            .build()
    }
}

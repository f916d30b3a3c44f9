//! Process Session state machine

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::types::identifiers::SessionId;
use crate::types::settings::AutonomyLevel;

/// Lifecycle phase of a Process Session
///
/// ```text
/// Unstarted ──start──▶ Starting ──initialize──▶ Idle ◀──────▶ TurnActive
///     ▲                    │                     │               │
///     └──────dispose───────┴──────────exit───────┴──▶ Terminated ┘
/// ```
///
/// A turn can only be active on an initialized session, so there is no way
/// to represent "turn active but uninitialized".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// No process
    Unstarted,
    /// Process running, not yet initialized
    Starting,
    /// Initialized, no turn running
    Idle {
        /// Canonical session id
        session_id: SessionId,
    },
    /// Initialized, a turn is running
    TurnActive {
        /// Canonical session id
        session_id: SessionId,
    },
    /// Process exited; `start` may launch a new one
    Terminated {
        /// Exit code of the last process
        exit_code: Option<i32>,
    },
}

impl SessionPhase {
    /// Whether a process is currently attached
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Idle { .. } | Self::TurnActive { .. }
        )
    }

    /// Canonical id, once initialized
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Idle { session_id } | Self::TurnActive { session_id } => Some(session_id),
            _ => None,
        }
    }

    /// Whether a turn is running
    #[must_use]
    pub fn is_turn_active(&self) -> bool {
        matches!(self, Self::TurnActive { .. })
    }

    /// Idle → TurnActive; returns whether the phase changed
    pub(super) fn begin_turn(&mut self) -> bool {
        match self {
            Self::Idle { session_id } => {
                *self = Self::TurnActive {
                    session_id: session_id.clone(),
                };
                true
            }
            _ => false,
        }
    }

    /// TurnActive → Idle; returns whether the phase changed
    pub(super) fn end_turn(&mut self) -> bool {
        match self {
            Self::TurnActive { session_id } => {
                *self = Self::Idle {
                    session_id: session_id.clone(),
                };
                true
            }
            _ => false,
        }
    }
}

/// Where the canonical id returned by `ensure_initialized` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitSource {
    /// Already initialized; nothing was sent
    ResumeInPlace,
    /// Fresh session, no resume requested
    Init,
    /// Prior session loaded
    Resume,
    /// Prior session could not be loaded; fresh session kept
    ResumeFailed,
    /// Prior id was not a canonical id; fresh session kept
    ResumeInvalid,
}

/// Result of `ensure_initialized`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    /// Canonical session id
    pub session_id: SessionId,
    /// How it was obtained
    pub source: InitSource,
}

/// Mutable process state, guarded by the session's state lock
pub(super) struct ProcessState {
    pub phase: SessionPhase,
    /// Bumped on every launch; tasks of older processes compare against it
    pub generation: u64,
    pub outbound: Option<mpsc::UnboundedSender<String>>,
    pub kill_tx: Option<oneshot::Sender<()>>,
    pub pid: Option<u32>,
    pub autonomy_level: Option<AutonomyLevel>,
    /// Set by `close`; `start` refuses from then on
    pub closed: bool,
}

impl ProcessState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Unstarted,
            generation: 0,
            outbound: None,
            kill_tx: None,
            pid: None,
            autonomy_level: None,
            closed: false,
        }
    }

    /// Detach the current process, leaving `phase` as given
    pub fn detach(&mut self, phase: SessionPhase) -> Option<oneshot::Sender<()>> {
        self.phase = phase;
        self.outbound = None;
        self.pid = None;
        self.autonomy_level = None;
        self.kill_tx.take()
    }
}

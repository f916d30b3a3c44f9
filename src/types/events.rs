//! Session and manager events
//!
//! A Process Session reports everything it observes through a single event
//! sink. The Session Manager re-tags those events with the session's current
//! external id and fans them out to subscribers.

use std::sync::Arc;

use serde_json::Value;

use super::identifiers::{RequestId, SessionId};
use crate::message::SessionNotification;
use crate::protocol::methods;

/// What an inbound request asks of the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundRequestKind {
    /// Permission to run a tool
    Permission,
    /// A question for the user
    AskUser,
    /// Any other method; still requires an answer
    Other,
}

impl InboundRequestKind {
    /// Classify by method name
    #[must_use]
    pub fn from_method(method: &str) -> Self {
        match method {
            methods::REQUEST_PERMISSION => Self::Permission,
            methods::ASK_USER => Self::AskUser,
            _ => Self::Other,
        }
    }
}

/// A request originated by the engine, awaiting `respond_to`
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    /// Id to answer with
    pub id: RequestId,
    /// Method name
    pub method: String,
    /// Classified method
    pub kind: InboundRequestKind,
    /// Parameters, `Null` when absent
    pub params: Value,
}

/// Event emitted by a Process Session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Notification forwarded unmodified
    Notification {
        /// Envelope method
        method: String,
        /// Raw params, `Null` when absent
        params: Value,
    },
    /// Engine request that needs an application decision
    InboundRequest(InboundRequest),
    /// Stdout line that is not a protocol message
    ProcessOutput(String),
    /// Stderr line
    Stderr(String),
    /// A turn began
    TurnStarted,
    /// A turn ended; `code` is 0 on success
    TurnEnded {
        /// Outcome code
        code: i32,
    },
    /// Something went wrong; usually followed by `TurnEnded`
    Error {
        /// Error description
        message: String,
    },
    /// The engine process went away
    ProcessExited {
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
    },
    /// The session is now known under a different id
    SessionIdReplaced {
        /// Id used until now
        previous: SessionId,
        /// Canonical id from now on
        current: SessionId,
    },
}

impl SessionEvent {
    /// Interpret a notification event
    #[must_use]
    pub fn notification(&self) -> Option<SessionNotification> {
        match self {
            Self::Notification { method, params } if method == methods::SESSION_NOTIFICATION => {
                SessionNotification::from_params(params)
            }
            _ => None,
        }
    }

    /// Assistant text carried by this event, if any
    #[must_use]
    pub fn assistant_text(&self) -> Option<String> {
        match self.notification()? {
            SessionNotification::AssistantTextDelta { text_delta, .. } => Some(text_delta),
            _ => None,
        }
    }
}

/// Event re-tagged by the Session Manager
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerEvent {
    /// External id the session is known under at emit time
    pub session_id: SessionId,
    /// The event
    pub event: SessionEvent,
}

/// Callback receiving a Process Session's events
pub type EventSink = Arc<dyn Fn(SessionEvent) + Send + Sync>;

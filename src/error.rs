//! Error types for the Droid session host

use std::time::Duration;

use thiserror::Error;

/// Main error type for the Droid session host
#[derive(Error, Debug)]
pub enum DroidError {
    /// Droid executable not found or not installed
    #[error("Droid executable not found: {0}")]
    ExecutableNotFound(String),

    /// The child process could not be spawned
    #[error("Failed to spawn droid process: {0}")]
    Spawn(String),

    /// Writing to or reading from the child process failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The child process exited while the operation was outstanding
    #[error("Droid process exited (exit code {code:?})")]
    ProcessExited {
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
    },

    /// The engine answered a request with an `error` object
    #[error("{method} failed ({code}): {message}")]
    Rpc {
        /// Method of the request that failed
        method: String,
        /// Engine error code
        code: i64,
        /// Engine error message
        message: String,
        /// Optional structured error data
        data: Option<serde_json::Value>,
    },

    /// No response arrived within the request window
    #[error("{method} timed out after {after:?}")]
    Timeout {
        /// Method of the request that timed out
        method: String,
        /// Window that elapsed
        after: Duration,
    },

    /// `initialize_session` succeeded without reporting a session id
    #[error("initialize_session returned no sessionId")]
    MissingSessionId,

    /// Operation requires an initialized session
    #[error("Session is not initialized")]
    NotInitialized,

    /// The session was closed and cannot launch another process
    #[error("Session is closed")]
    SessionClosed,

    /// No managed session under this id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Droid session operations
pub type Result<T> = std::result::Result<T, DroidError>;

impl DroidError {
    /// Create an executable not found error
    #[must_use]
    pub fn executable_not_found() -> Self {
        Self::ExecutableNotFound(
            "droid not found. Install the Factory CLI, or set DROID_BIN to the executable path"
                .to_string(),
        )
    }

    /// Create a spawn error
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a process exited error
    #[must_use]
    pub fn process_exited(code: Option<i32>) -> Self {
        Self::ProcessExited { code }
    }

    /// Create a timeout error
    pub fn timeout(method: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            method: method.into(),
            after,
        }
    }

    /// Create a session not found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound(session_id.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error came from the engine rather than the transport
    #[must_use]
    pub fn is_rpc(&self) -> bool {
        matches!(self, Self::Rpc { .. })
    }
}

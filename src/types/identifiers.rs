//! Session and request identifiers
//!
//! Both are opaque strings on the wire. Keeping them as distinct types stops
//! a request id from being passed where a session id is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session ID newtype
///
/// Used both for caller-chosen external ids and for canonical ids assigned by
/// the engine. Only the latter are guaranteed to pass [`SessionId::is_canonical`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new session ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a local placeholder id that can never collide with an engine id
    #[must_use]
    pub fn placeholder() -> Self {
        Self(format!("pending-{}", Uuid::new_v4()))
    }

    /// Get the session ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id has the shape of an engine-assigned session id
    ///
    /// The engine hands out hyphenated UUIDs; anything else cannot be passed
    /// to `load_session`.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.0.len() == 36 && Uuid::try_parse(&self.0).is_ok()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Request ID newtype for the JSON-RPC dialect
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Create a new request ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the id for the `seq`-th outbound request of a session
    #[must_use]
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("req-{seq}"))
    }

    /// Get the request ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

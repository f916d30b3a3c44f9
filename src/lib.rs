//! # Droid Session Host for Rust
//!
//! Drives Droid agent engines from a Rust application. Each conversation is
//! backed by its own `droid` process speaking a line-delimited JSON-RPC
//! dialect over stdio; this crate correlates requests with responses, tracks
//! turns, forwards the engine's interactive requests and manages many such
//! sessions at once.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kodegen_droid_agent::{ManagerConfig, SessionEvent, SessionManager, UserMessageRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = SessionManager::new(ManagerConfig::from_env()?)?;
//!     let mut events = manager.subscribe();
//!
//!     manager
//!         .send_user_message(UserMessageRequest::new("draft-1", "Summarize README.md"))
//!         .await;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let Some(text) = event.event.assistant_text() {
//!             print!("{text}");
//!         }
//!         if matches!(event.event, SessionEvent::TurnEnded { .. }) {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`message`]: Line framing and notification decoding
//! - [`protocol`]: Wire envelope and method names
//! - [`session`]: One process, one conversation
//! - [`manager`]: Many sessions keyed by external id, with rekeying and
//!   event fan-out
//! - [`transport`]: Launching the engine process
//! - [`diagnostics`]: Redacted audit trail of protocol traffic
//! - [`types`]: Identifiers, options, settings and events
//! - [`error`]: Error types and handling
//!
//! ## Error Handling
//!
//! Direct calls return [`Result<T, DroidError>`](Result). Sending a user
//! message through the [`SessionManager`] never fails; problems surface as
//! [`SessionEvent::Error`] followed by a failing [`SessionEvent::TurnEnded`].
//!
//! ```no_run
//! # use kodegen_droid_agent::{DroidError, ManagerConfig, SessionManager};
//! # async fn example() -> Result<(), DroidError> {
//! let manager = SessionManager::new(ManagerConfig::from_env()?)?;
//! match manager.create_session(None, None).await {
//!     Ok(id) => log::info!("New session {id}"),
//!     Err(DroidError::ExecutableNotFound(msg)) => log::error!("{msg}"),
//!     Err(e) => log::error!("Error: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diagnostics;
pub mod error;
pub mod manager;
pub mod message;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// Re-export commonly used types for external API
pub use diagnostics::{DiagnosticRecord, DiagnosticsSink, Direction, MemoryDiagnostics};
pub use error::{DroidError, Result};
pub use manager::{ManagerConfig, SessionManager, UserMessageRequest};
pub use message::{LineParser, ParsedLine, SessionNotification, WorkingState};
pub use protocol::ProtocolMessage;
pub use session::{InitOutcome, InitSource, ProcessSession, ProcessSessionBuilder, SessionPhase};
pub use transport::{
    DefaultResolver, ExecutableResolver, Launcher, ProcessHandle, ProcessIo, SubprocessLauncher,
};

// Re-export type submodules for flat public API
pub use types::events::{EventSink, InboundRequest, InboundRequestKind, ManagerEvent, SessionEvent};
pub use types::identifiers::{RequestId, SessionId};
pub use types::options::{NullIdPolicy, SessionOptions, SessionOptionsBuilder};
pub use types::settings::{AutonomyLevel, SessionSettings, SessionSettingsBuilder};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

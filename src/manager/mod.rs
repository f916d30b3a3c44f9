//! Multi-session management
//!
//! Provides `SessionManager` for running many Process Sessions side by side,
//! keyed by the id callers know them under. Sessions are created lazily,
//! re-keyed when the engine reports a different canonical id, and their
//! events are fanned out to every subscriber.
//!
//! # Module Structure
//!
//! - `config` - `ManagerConfig` and environment loading
//! - `table` - Session table with rekey and alias bookkeeping
//! - `helpers` - Event re-tagging sink
//! - `session_manager` - `SessionManager` with its public API

mod config;
mod helpers;
mod session_manager;
mod table;

pub use config::{DEFAULT_EVENT_CAPACITY, DROID_MACHINE_ID_ENV, DROID_MODEL_ENV, ManagerConfig};
pub use session_manager::{SessionManager, UserMessageRequest};

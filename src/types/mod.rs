//! Type definitions for the Droid session host
//!
//! - [`identifiers`] - Type-safe ID wrappers (`SessionId`, `RequestId`)
//! - [`settings`] - Engine session settings and patches
//! - [`options`] - Per-session launch options
//! - [`events`] - Session and manager events

pub mod events;
pub mod identifiers;
pub mod options;
pub mod settings;

pub use events::{EventSink, InboundRequest, InboundRequestKind, ManagerEvent, SessionEvent};
pub use identifiers::{RequestId, SessionId};
pub use options::{NullIdPolicy, SessionOptions, SessionOptionsBuilder};
pub use settings::{AutonomyLevel, SessionSettings, SessionSettingsBuilder};

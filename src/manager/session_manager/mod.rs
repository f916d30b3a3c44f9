//! Session manager implementation
//!
//! This module is organized into logical submodules:
//! - `core`: Core struct, constructor, lookups and session registration
//! - `spawn`: User messages, rekeying and throwaway session creation
//! - `interaction`: Cancellation, disposal and inbound request answers
//! - `events`: Subscriptions and per-session event streams

mod core;
mod events;
mod interaction;
mod spawn;

pub use self::core::SessionManager;
pub use spawn::UserMessageRequest;

//! Decoding of engine output
//!
//! - [`parser`] - incremental line framing and message classification
//! - [`notifications`] - typed view of `droid.session_notification` payloads

pub mod notifications;
pub mod parser;

pub use notifications::{SessionNotification, WorkingState};
pub use parser::{LineParser, ParsedLine, parse_lines};

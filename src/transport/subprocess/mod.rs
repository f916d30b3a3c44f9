//! Subprocess transport spawning the `droid` CLI
//!
//! The engine is started as `droid exec --input-format stream-jsonrpc
//! --output-format stream-jsonrpc --cwd <dir>` with all stdio piped.

mod command;
mod config;
mod launcher;
mod lifecycle;

// Re-export public types
pub use command::CommandBuilder;
pub use config::{ALLOWED_EXTRA_FLAGS, DANGEROUS_ENV_VARS, DROID_BIN_ENV};
pub use launcher::{DefaultResolver, SubprocessLauncher};

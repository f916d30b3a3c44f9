//! Configuration constants for subprocess transport

/// Environment variable naming the engine executable
pub const DROID_BIN_ENV: &str = "DROID_BIN";

/// Executable name searched on `PATH`
pub const DROID_EXECUTABLE: &str = "droid";

/// Wire format passed for both `--input-format` and `--output-format`
pub const STREAM_FORMAT: &str = "stream-jsonrpc";

/// Variables never forwarded from `SessionOptions::env`
///
/// They change how the engine's runtime loads code. The engine still
/// inherits the parent's own values.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];

/// Flags `SessionOptions::extra_args` may add to `droid exec`
pub const ALLOWED_EXTRA_FLAGS: &[&str] = &["model", "reasoning-effort", "log-level"];

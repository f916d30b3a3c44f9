//! Per-session options
//!
//! Options that shape how a session's process is launched and driven, with a
//! builder for convenient configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default window for a single outbound request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Machine identity reported when none is configured
pub const DEFAULT_MACHINE_ID: &str = "kodegen-droid-agent";

/// Which pending request a response with `id: null` settles
///
/// The engine answers some failed requests with a null id. Without a
/// fallback those responses would be lost and the caller would wait for the
/// timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullIdPolicy {
    /// The longest-outstanding request
    #[default]
    Oldest,
    /// The most recently sent request
    Newest,
    /// Drop the response
    Ignore,
}

// ============================================================================
// Session Options
// ============================================================================

/// Options for one Process Session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Working directory of the engine (also sent as `cwd` on init)
    pub cwd: PathBuf,
    /// Machine identity sent on `initialize_session`
    pub machine_id: String,
    /// Environment variables for the engine process
    pub env: HashMap<String, String>,
    /// Window after which an unanswered request fails
    pub request_timeout: Duration,
    /// Model passed as `--model` on the command line
    pub model: Option<String>,
    /// Extra CLI flags (only allowlisted flags are passed on)
    pub extra_args: HashMap<String, Option<String>>,
    /// Settlement of responses carrying `id: null`
    pub null_id_policy: NullIdPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            machine_id: DEFAULT_MACHINE_ID.to_string(),
            env: HashMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            model: None,
            extra_args: HashMap::new(),
            null_id_policy: NullIdPolicy::default(),
        }
    }
}

impl SessionOptions {
    /// Create a new builder for `SessionOptions`
    #[must_use]
    pub fn builder() -> SessionOptionsBuilder {
        SessionOptionsBuilder::default()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SessionOptions`]
#[derive(Debug, Default)]
pub struct SessionOptionsBuilder {
    options: SessionOptions,
}

impl SessionOptionsBuilder {
    /// Set the working directory
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.options.cwd = cwd.into();
        self
    }

    /// Set the machine identity
    #[must_use]
    pub fn machine_id(mut self, machine_id: impl Into<String>) -> Self {
        self.options.machine_id = machine_id.into();
        self
    }

    /// Add an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    /// Launch the engine with `--model <model>`
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    /// Add an extra CLI flag
    #[must_use]
    pub fn extra_arg(mut self, flag: impl Into<String>, value: Option<String>) -> Self {
        self.options.extra_args.insert(flag.into(), value);
        self
    }

    /// Set how responses with `id: null` are matched
    #[must_use]
    pub fn null_id_policy(mut self, policy: NullIdPolicy) -> Self {
        self.options.null_id_policy = policy;
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> SessionOptions {
        self.options
    }
}

//! Session Manager configuration

use std::sync::Arc;

use crate::diagnostics::DiagnosticsSink;
use crate::error::{DroidError, Result};
use crate::transport::{Launcher, SubprocessLauncher};
use crate::types::options::SessionOptions;
use crate::types::settings::{AutonomyLevel, SessionSettings};

/// Default capacity of the manager's event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Environment variable naming the default model
pub const DROID_MODEL_ENV: &str = "DROID_MODEL";

/// Environment variable overriding the machine identity
pub const DROID_MACHINE_ID_ENV: &str = "DROID_MACHINE_ID";

/// Configuration for a [`SessionManager`](super::SessionManager)
#[derive(Clone)]
pub struct ManagerConfig {
    /// Launches engine processes
    pub launcher: Arc<dyn Launcher>,
    /// Options for sessions created without explicit options
    pub session_defaults: SessionOptions,
    /// Settings used when a message carries none
    pub default_settings: SessionSettings,
    /// Optional audit trail of protocol traffic
    pub diagnostics: Option<Arc<dyn DiagnosticsSink>>,
    /// Buffered events per subscriber before old ones are dropped
    pub event_capacity: usize,
}

impl ManagerConfig {
    /// Configuration with defaults around `launcher`
    #[must_use]
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self {
            launcher,
            session_defaults: SessionOptions::default(),
            default_settings: SessionSettings::builder()
                .autonomy_level(AutonomyLevel::Low)
                .build(),
            diagnostics: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Configuration for the real `droid` executable
    ///
    /// Reads `DROID_MODEL` and `DROID_MACHINE_ID`; the executable itself is
    /// located through `DROID_BIN` or `PATH` when the first session starts.
    ///
    /// # Errors
    /// Returns error if a variable is set but empty
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(Arc::new(SubprocessLauncher::new()));
        if let Some(model) = non_empty_env(DROID_MODEL_ENV)? {
            config.session_defaults.model = Some(model.clone());
            config.default_settings.model_id = Some(model);
        }
        if let Some(machine_id) = non_empty_env(DROID_MACHINE_ID_ENV)? {
            config.session_defaults.machine_id = machine_id;
        }
        Ok(config)
    }

    /// Set options for sessions created without explicit options
    #[must_use]
    pub fn with_session_defaults(mut self, options: SessionOptions) -> Self {
        self.session_defaults = options;
        self
    }

    /// Set settings used when a message carries none
    #[must_use]
    pub fn with_default_settings(mut self, settings: SessionSettings) -> Self {
        self.default_settings = settings;
        self
    }

    /// Record protocol traffic of every session
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Set the event channel capacity
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check the configuration for values the manager cannot work with
    ///
    /// # Errors
    /// Returns error if the event capacity or request timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(DroidError::invalid_config("event_capacity must be positive"));
        }
        if self.session_defaults.request_timeout.is_zero() {
            return Err(DroidError::invalid_config("request_timeout must be positive"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("session_defaults", &self.session_defaults)
            .field("default_settings", &self.default_settings)
            .field("diagnostics", &self.diagnostics.is_some())
            .field("event_capacity", &self.event_capacity)
            .finish_non_exhaustive()
    }
}

fn non_empty_env(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => {
            Err(DroidError::invalid_config(format!("{name} is set but empty")))
        }
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(DroidError::invalid_config(format!(
            "{name} is not valid unicode"
        ))),
    }
}

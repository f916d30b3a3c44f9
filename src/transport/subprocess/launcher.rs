//! Subprocess launcher for the `droid` executable

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{DroidError, Result};
use crate::transport::{ExecutableResolver, Launcher, ProcessIo};
use crate::types::options::SessionOptions;

use super::config::{DROID_BIN_ENV, DROID_EXECUTABLE};

/// Default executable lookup
///
/// Tries, in order: an explicit path, `$DROID_BIN`, `droid` on `PATH`, and
/// the installer's default location.
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver {
    explicit: Option<PathBuf>,
}

impl DefaultResolver {
    /// Resolver that always yields `path`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            explicit: Some(path.into()),
        }
    }
}

impl ExecutableResolver for DefaultResolver {
    fn resolve(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.explicit {
            return Ok(path.clone());
        }

        if let Ok(path) = env::var(DROID_BIN_ENV)
            && !path.trim().is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        if let Ok(path) = which::which(DROID_EXECUTABLE) {
            return Ok(path);
        }

        let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
        let fallback = PathBuf::from(home).join(".local/bin").join(DROID_EXECUTABLE);
        if fallback.is_file() {
            return Ok(fallback);
        }

        Err(DroidError::executable_not_found())
    }
}

/// Launcher spawning real `droid exec` processes
#[derive(Clone)]
pub struct SubprocessLauncher {
    pub(super) resolver: Arc<dyn ExecutableResolver>,
}

impl SubprocessLauncher {
    /// Create a launcher using the default executable lookup
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(DefaultResolver::default()))
    }

    /// Create a launcher with a custom path-resolution collaborator
    #[must_use]
    pub fn with_resolver(resolver: Arc<dyn ExecutableResolver>) -> Self {
        Self { resolver }
    }
}

impl Default for SubprocessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubprocessLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessLauncher").finish_non_exhaustive()
    }
}

impl Launcher for SubprocessLauncher {
    fn launch(&self, options: &SessionOptions) -> Result<ProcessIo> {
        self.launch_impl(options)
    }
}

//! Transport layer for launching Droid engine processes
//!
//! A Process Session never spawns anything itself; it asks a [`Launcher`]
//! for a [`ProcessIo`] bundle. The production launcher spawns the `droid`
//! executable, while tests can hand out in-memory pipes.

pub mod subprocess;

use std::path::PathBuf;

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::types::options::SessionOptions;

/// Boxed engine stdin
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Boxed engine stdout/stderr
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Handle to a running engine process
pub trait ProcessHandle: Send {
    /// OS process id, if there is one
    fn id(&self) -> Option<u32>;

    /// Begin forcible termination without waiting for it
    ///
    /// # Errors
    /// Returns error if the kill signal cannot be delivered
    fn start_kill(&mut self) -> std::io::Result<()>;

    /// Wait for the process to exit, yielding its exit code
    ///
    /// The code is `None` when the process was terminated by a signal.
    fn wait(&mut self) -> BoxFuture<'_, std::io::Result<Option<i32>>>;
}

/// Everything a Process Session needs from a launched engine
pub struct ProcessIo {
    /// Engine stdin
    pub stdin: BoxedWriter,
    /// Engine stdout
    pub stdout: BoxedReader,
    /// Engine stderr, if captured
    pub stderr: Option<BoxedReader>,
    /// Process handle
    pub process: Box<dyn ProcessHandle>,
}

/// Launches engine processes
pub trait Launcher: Send + Sync {
    /// Launch one engine process for a session
    ///
    /// # Errors
    /// Returns error if the executable cannot be resolved or spawned
    fn launch(&self, options: &SessionOptions) -> Result<ProcessIo>;
}

/// Supplies the path of the engine executable
pub trait ExecutableResolver: Send + Sync {
    /// Resolve the executable path
    ///
    /// # Errors
    /// Returns error if no executable can be found
    fn resolve(&self) -> Result<PathBuf>;
}

pub use subprocess::{DefaultResolver, SubprocessLauncher};

//! Lifecycle management for subprocess transport (spawn, kill, wait)

use std::process::Stdio;

use futures::future::BoxFuture;
use tokio::process::Child;

use crate::error::{DroidError, Result};
use crate::transport::{ProcessHandle, ProcessIo};
use crate::types::options::SessionOptions;

use super::command::CommandBuilder;
use super::launcher::SubprocessLauncher;

impl SubprocessLauncher {
    /// Spawn the engine and hand out its stdio
    ///
    /// # Errors
    /// Returns error if the executable cannot be resolved, the process fails
    /// to spawn, or stdio handles cannot be obtained
    pub(super) fn launch_impl(&self, options: &SessionOptions) -> Result<ProcessIo> {
        let executable = self.resolver.resolve()?;
        let mut cmd = CommandBuilder::new(&executable, options).build();

        // Pipe stderr instead of inheriting so the child cannot touch the
        // parent terminal.
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if !options.cwd.exists() {
                return DroidError::spawn(format!(
                    "Working directory does not exist: {}",
                    options.cwd.display()
                ));
            }
            DroidError::spawn(format!("Failed to start {}: {e}", executable.display()))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DroidError::spawn("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DroidError::spawn("Failed to get stdout handle"))?;
        let stderr = child.stderr.take();

        log::debug!(
            "Spawned {} (pid {:?}) in {}",
            executable.display(),
            child.id(),
            options.cwd.display()
        );

        Ok(ProcessIo {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: stderr.map(|s| Box::new(s) as crate::transport::BoxedReader),
            process: Box::new(child),
        })
    }
}

impl ProcessHandle for Child {
    fn id(&self) -> Option<u32> {
        Child::id(self)
    }

    fn start_kill(&mut self) -> std::io::Result<()> {
        Child::start_kill(self)
    }

    fn wait(&mut self) -> BoxFuture<'_, std::io::Result<Option<i32>>> {
        Box::pin(async move { Child::wait(self).await.map(|status| status.code()) })
    }
}

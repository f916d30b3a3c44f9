//! CLI command building logic for subprocess transport

use std::path::Path;
use tokio::process::Command;

use crate::VERSION;
use crate::types::options::SessionOptions;

use super::config::{ALLOWED_EXTRA_FLAGS, DANGEROUS_ENV_VARS, STREAM_FORMAT};

/// Command builder for `droid exec`
pub struct CommandBuilder<'a> {
    executable: &'a Path,
    options: &'a SessionOptions,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub fn new(executable: &'a Path, options: &'a SessionOptions) -> Self {
        Self {
            executable,
            options,
        }
    }

    /// Build the complete CLI command with all arguments
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.executable);

        cmd.arg("exec")
            .arg("--input-format")
            .arg(STREAM_FORMAT)
            .arg("--output-format")
            .arg(STREAM_FORMAT)
            .arg("--cwd")
            .arg(&self.options.cwd);

        if let Some(model) = &self.options.model {
            cmd.arg("--model").arg(model);
        }
        self.add_extra_args(&mut cmd);

        for (key, value) in &self.options.env {
            if DANGEROUS_ENV_VARS.contains(&key.as_str()) {
                log::warn!("Refusing to pass {key} to the droid process");
            } else {
                cmd.env(key, value);
            }
        }
        cmd.env("KODEGEN_DROID_AGENT_VERSION", VERSION);

        if self.options.cwd.is_dir() {
            cmd.current_dir(&self.options.cwd);
        }

        cmd
    }

    fn add_extra_args(&self, cmd: &mut Command) {
        let mut flags: Vec<_> = self.options.extra_args.iter().collect();
        flags.sort_by(|a, b| a.0.cmp(b.0));

        for (flag, value) in flags {
            if flag == "model" && self.options.model.is_some() {
                log::debug!("Ignoring extra flag --model: model already set");
                continue;
            }
            if !ALLOWED_EXTRA_FLAGS.contains(&flag.as_str()) {
                log::warn!("Ignoring extra flag --{flag}: not allowlisted");
                continue;
            }
            cmd.arg(format!("--{flag}"));
            if let Some(v) = value {
                cmd.arg(v);
            }
        }
    }
}

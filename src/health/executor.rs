//! External command execution.
//!
//! The probe only ever needs "run this program, give me stdout". `CommandExecutor`
//! is that capability; `TokioCommandExecutor` is the subprocess-backed version
//! used in production.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::CommandError;

/// Runs a program and returns its captured standard output.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError>;
}

/// `CommandExecutor` backed by `tokio::process` with a per-command timeout.
///
/// Children are spawned with `kill_on_drop`, so a command abandoned on timeout
/// is killed rather than left running.
#[derive(Debug, Clone)]
pub struct TokioCommandExecutor {
    timeout: Duration,
}

impl TokioCommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandExecutor for TokioCommandExecutor {
    #[instrument(skip(self, args), fields(args = ?args))]
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CommandError::Timeout {
                program: program.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| CommandError::InvalidOutput {
            program: program.to_string(),
        })?;
        debug!(bytes = stdout.len(), "Command completed");
        Ok(stdout)
    }
}

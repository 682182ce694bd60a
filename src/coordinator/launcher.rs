//! Worker launchers - start the process that runs a single step

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Error types for worker launches
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Worker command for step '{0}' is empty")]
    EmptyCommand(String),

    #[error("Failed to spawn worker for step '{step}': {reason}")]
    Spawn { step: String, reason: String },

    #[error("Worker for step '{step}' exited with code {code}: {stderr}")]
    Exit {
        step: String,
        code: i32,
        stderr: String,
    },

    #[error("Worker for step '{step}' timed out after {secs} seconds")]
    Timeout { step: String, secs: u64 },
}

/// Starts the worker for one step and waits until it finishes
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Run `command` for `step`; success means the worker exited cleanly
    async fn launch(&self, step: &str, command: &[String]) -> Result<(), LaunchError>;
}

/// Runs each worker as a local child process
#[derive(Debug, Clone, Default)]
pub struct SubprocessLauncher {
    /// Replaces the first element of the worker command
    program: Option<String>,

    /// Per-worker timeout in seconds
    timeout_secs: Option<u64>,
}

impl SubprocessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}

#[async_trait]
impl WorkerLauncher for SubprocessLauncher {
    async fn launch(&self, step: &str, command: &[String]) -> Result<(), LaunchError> {
        let (first, args) = command
            .split_first()
            .ok_or_else(|| LaunchError::EmptyCommand(step.to_string()))?;
        let program = self.program.as_deref().unwrap_or(first);

        debug!(step, program, args = args.len(), "Spawning worker process");

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let result = match self.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), output)
                .await
                .map_err(|_| LaunchError::Timeout {
                    step: step.to_string(),
                    secs,
                })?,
            None => output.await,
        };

        let output = result.map_err(|e| LaunchError::Spawn {
            step: step.to_string(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            warn!(step, code, "Worker exited with failure: {}", stderr);
            return Err(LaunchError::Exit {
                step: step.to_string(),
                code,
                stderr,
            });
        }

        debug!(step, "Worker finished");
        Ok(())
    }
}

/// Records worker commands instead of running them
#[derive(Debug, Default)]
pub struct DryRunLauncher {
    launched: Mutex<Vec<(String, Vec<String>)>>,
}

impl DryRunLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(step, command)` pairs in launch order
    pub fn launched(&self) -> Vec<(String, Vec<String>)> {
        self.launched.lock().clone()
    }
}

#[async_trait]
impl WorkerLauncher for DryRunLauncher {
    async fn launch(&self, step: &str, command: &[String]) -> Result<(), LaunchError> {
        if command.is_empty() {
            return Err(LaunchError::EmptyCommand(step.to_string()));
        }
        self.launched
            .lock()
            .push((step.to_string(), command.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_dry_run_records_commands() {
        let launcher = DryRunLauncher::new();
        launcher.launch("a", &command(&["worker", "--x", "1"])).await.unwrap();
        launcher.launch("b", &command(&["worker"])).await.unwrap();

        let launched = launcher.launched();
        assert_eq!(launched.len(), 2);
        assert_eq!(launched[0].0, "a");
        assert_eq!(launched[0].1, ["worker", "--x", "1"]);
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let result = SubprocessLauncher::new().launch("a", &[]).await;
        assert!(matches!(result, Err(LaunchError::EmptyCommand(step)) if step == "a"));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let result = SubprocessLauncher::new()
            .launch("a", &command(&["nonexistent-worker-binary-7f3a"]))
            .await;
        assert!(matches!(result, Err(LaunchError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_is_reported() {
        let launcher = SubprocessLauncher::new();
        launcher.launch("ok", &command(&["true"])).await.unwrap();

        let result = launcher.launch("bad", &command(&["false"])).await;
        assert!(matches!(result, Err(LaunchError::Exit { code: 1, .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let launcher = SubprocessLauncher::new().with_timeout(1);
        let result = launcher.launch("slow", &command(&["sleep", "5"])).await;
        assert!(matches!(result, Err(LaunchError::Timeout { secs: 1, .. })));
    }
}

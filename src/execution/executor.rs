//! Step executor seam - invokes a step's external tool

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Error raised when an executor invocation fails before producing an exit
/// status
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to spawn `{tool}`: {message}")]
    Spawn { tool: String, message: String },

    #[error("timed out after {0} seconds")]
    Timeout(u64),
}

/// Exit status reported by an executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(i32);

impl ExitStatus {
    pub fn new(code: i32) -> Self {
        Self(code)
    }

    pub fn code(&self) -> i32 {
        self.0
    }

    pub fn success(&self) -> bool {
        self.0 == 0
    }
}

/// Everything an executor needs to run one step
///
/// Settings and resolved secrets are already materialized into `env`;
/// the executor treats them as opaque.
#[derive(Debug, Clone)]
pub struct StepInvocation {
    /// Step name, for diagnostics
    pub step_name: String,

    /// Executor reference (external tool/image)
    pub image: String,

    /// Commands to run (empty for plugin-style steps driven by `env`)
    pub commands: Vec<String>,

    /// Environment handed to the executor process
    pub env: HashMap<String, String>,

    /// Maximum wall-clock time for the invocation
    pub timeout: Duration,
}

/// Trait for step execution - allows for different implementations
///
/// Production implementations shell out or call APIs; test implementations
/// are deterministic fakes.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Invoke the step's external tool and report its exit status
    async fn execute(&self, invocation: &StepInvocation) -> Result<ExitStatus, ExecutorError>;
}

/// Executor that spawns the step's tool as a local subprocess
///
/// Steps with commands run them through a shell with `set -e`, so the
/// first failing command decides the exit status. Steps without commands
/// invoke the tool directly, driven by the environment alone.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    shell: String,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    fn build_command(&self, invocation: &StepInvocation) -> (String, Command) {
        if invocation.commands.is_empty() {
            (invocation.image.clone(), Command::new(&invocation.image))
        } else {
            let mut script = String::from("set -e\n");
            for line in &invocation.commands {
                script.push_str(line);
                script.push('\n');
            }
            let mut command = Command::new(&self.shell);
            command.arg("-c").arg(script);
            (self.shell.clone(), command)
        }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepExecutor for ProcessExecutor {
    async fn execute(&self, invocation: &StepInvocation) -> Result<ExitStatus, ExecutorError> {
        debug!(
            step = %invocation.step_name,
            image = %invocation.image,
            commands = invocation.commands.len(),
            "spawning step executor"
        );

        let (tool, mut command) = self.build_command(invocation);
        command.envs(&invocation.env).kill_on_drop(true);

        let result = timeout(invocation.timeout, command.output())
            .await
            .map_err(|_| ExecutorError::Timeout(invocation.timeout.as_secs()))?;

        let output = result.map_err(|e| ExecutorError::Spawn {
            tool,
            message: e.to_string(),
        })?;

        let code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                step = %invocation.step_name,
                code,
                stderr = %stderr.trim_end(),
                "step executor exited non-zero"
            );
        }

        Ok(ExitStatus::new(code))
    }
}

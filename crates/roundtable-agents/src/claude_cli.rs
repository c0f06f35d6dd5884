use async_trait::async_trait;
use roundtable_models::config::ProviderConfig;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::chat::{ChatProvider, ChatRequest};
use crate::error::AgentError;

/// A chat provider backed by a `claude`-compatible CLI.
///
/// The child process is killed when the returned future is dropped, so a
/// timeout or cancellation upstream aborts the call instead of orphaning it.
#[derive(Debug, Clone)]
pub struct ClaudeCliProvider {
    name: String,
    command: String,
    model: String,
}

impl ClaudeCliProvider {
    pub fn new(name: impl Into<String>, command: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(&config.name, &config.command, &config.model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatProvider for ClaudeCliProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, AgentError> {
        debug!(provider = %self.name, model = %self.model, "Invoking chat CLI");

        let result = Command::new(&self.command)
            .args([
                "-p",
                request.user.as_str(),
                "--system-prompt",
                request.system.as_str(),
                "--model",
                self.model.as_str(),
                "--output-format",
                "text",
            ])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AgentError::Transport(format!("Failed to spawn {}: {e}", self.command)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            warn!(provider = %self.name, status = %result.status, stderr = %stderr, "Chat CLI failed");
            return Err(AgentError::Transport(format!(
                "{} exited {}: {}",
                self.command, result.status, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&result.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(AgentError::Transport(format!(
                "{} returned empty response",
                self.name
            )));
        }

        Ok(stdout)
    }
}

/// Check if the CLI is available on the system.
pub async fn check_cli_available(command: &str) -> bool {
    match Command::new(command).arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

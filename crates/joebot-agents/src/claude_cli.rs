use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::completion::{CompletionClient, CompletionRequest};
use crate::error::PlanningFailure;

/// Configuration for a Claude CLI invocation.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// One non-interactive `claude` run printing plain text.
fn claude_command(system_prompt: &str, user_prompt: &str, model: &str) -> Command {
    let mut command = Command::new("claude");
    command
        .arg("--print")
        .arg(user_prompt)
        .args(["--system-prompt", system_prompt])
        .args(["--model", model])
        .args(["--output-format", "text"])
        .stdin(Stdio::null())
        .kill_on_drop(true);
    command
}

/// Run one completion through the `claude` CLI and return its stdout.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, PlanningFailure> {
    debug!(model = %config.model, prompt_len = user_prompt.len(), "Running claude CLI");

    let mut command = claude_command(system_prompt, user_prompt, &config.model);
    let output = match tokio::time::timeout(config.timeout, command.output()).await {
        Err(_) => return Err(PlanningFailure::Timeout(config.timeout)),
        Ok(Err(e)) => {
            return Err(PlanningFailure::Network(format!("could not start claude: {e}")))
        }
        Ok(Ok(output)) => output,
    };
    completion_text(output)
}

/// Stdout of a finished run, or the failure the exit status reports.
fn completion_text(output: Output) -> Result<String, PlanningFailure> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        warn!(status = %output.status, stderr, "claude CLI exited with an error");
        return Err(PlanningFailure::Service(format!(
            "claude exited {}: {stderr}",
            output.status
        )));
    }
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    if text.trim().is_empty() {
        return Err(PlanningFailure::Malformed(
            "claude printed an empty response".to_string(),
        ));
    }
    Ok(text)
}

/// Whether a working `claude` binary is on PATH.
pub async fn check_cli_available() -> bool {
    Command::new("claude")
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .is_ok_and(|output| output.status.success())
}

/// Completion backend that shells out to the local `claude` CLI.
pub struct ClaudeCliClient {
    config: ClaudeCliConfig,
}

impl ClaudeCliClient {
    pub fn new(model: String, timeout: Duration) -> Self {
        Self {
            config: ClaudeCliConfig { model, timeout },
        }
    }
}

#[async_trait]
impl CompletionClient for ClaudeCliClient {
    fn name(&self) -> &str {
        "claude_cli"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, PlanningFailure> {
        invoke_claude(&request.system_prompt, &request.user_prompt, &self.config).await
    }
}

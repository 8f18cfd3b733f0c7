//! Shell-command agent: launches an external agent process in the workspace.
//!
//! The prompt is passed in `PARITY_PROMPT`. The process reports tool calls
//! by printing `TOOL_CALL {json}` lines and, optionally, token usage with a
//! `USAGE {json}` line.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parity_core::domain::{ExecutionResult, Result};
use parity_core::{AgentExecutor, LocalSandbox, ParityError, Sandbox, TokenUsage, ToolCallEvent};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const PROMPT_ENV: &str = "PARITY_PROMPT";
const TOOL_CALL_MARKER: &str = "TOOL_CALL";
const USAGE_MARKER: &str = "USAGE";

#[derive(Debug, Deserialize)]
struct ToolCallLine {
    #[serde(alias = "tool", alias = "name")]
    tool_name: String,
    #[serde(default)]
    input: BTreeMap<String, Value>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default = "default_success")]
    success: bool,
}

fn default_success() -> bool {
    true
}

impl From<ToolCallLine> for ToolCallEvent {
    fn from(line: ToolCallLine) -> Self {
        ToolCallEvent {
            tool_name: line.tool_name,
            input: line.input,
            output: line.output,
            success: line.success,
        }
    }
}

fn marker_payload<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix(marker)?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

/// Extract `TOOL_CALL {json}` events from agent output, in order.
/// Malformed lines are skipped.
pub fn parse_tool_calls(output: &str) -> Vec<ToolCallEvent> {
    output
        .lines()
        .filter_map(|line| marker_payload(line, TOOL_CALL_MARKER))
        .filter_map(|payload| match serde_json::from_str::<ToolCallLine>(payload) {
            Ok(line) => Some(line.into()),
            Err(e) => {
                debug!(error = %e, "skipping malformed tool call line");
                None
            }
        })
        .collect()
}

/// Sum every `USAGE {json}` line in the output.
pub fn parse_usage(output: &str) -> TokenUsage {
    output
        .lines()
        .filter_map(|line| marker_payload(line, USAGE_MARKER))
        .filter_map(|payload| serde_json::from_str::<TokenUsage>(payload).ok())
        .fold(TokenUsage::default(), |acc, u| TokenUsage {
            input_tokens: acc.input_tokens + u.input_tokens,
            output_tokens: acc.output_tokens + u.output_tokens,
        })
}

/// [`AgentExecutor`] backed by a shell command.
#[derive(Debug, Default)]
pub struct CommandAgent {
    calls: Mutex<Vec<ToolCallEvent>>,
    usage: Mutex<TokenUsage>,
}

impl CommandAgent {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentExecutor for CommandAgent {
    async fn execute(
        &self,
        command: &str,
        working_dir: &Path,
        input: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult> {
        if command.trim().is_empty() {
            return Err(ParityError::Agent("no agent command configured".to_string()));
        }

        let mut sandbox = LocalSandbox::fixed(working_dir).with_env(PROMPT_ENV, input);
        sandbox.start().await?;
        let outcome = sandbox.exec(command, None, timeout).await;
        if let Err(e) = sandbox.close().await {
            warn!(error = %e, "failed to close agent sandbox");
        }
        let result = outcome?;

        let calls = parse_tool_calls(&result.output);
        debug!(
            tool_calls = calls.len(),
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            "agent command finished"
        );
        *self.calls.lock().await = calls;
        *self.usage.lock().await = parse_usage(&result.output);
        Ok(result)
    }

    async fn tool_calls(&self) -> Vec<ToolCallEvent> {
        self.calls.lock().await.clone()
    }

    async fn usage(&self) -> TokenUsage {
        *self.usage.lock().await
    }
}

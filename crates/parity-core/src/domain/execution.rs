//! Execution records: command results, tool-call events and run summaries.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of running a command in a sandbox or invoking an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Captured stdout followed by stderr. Partial when the command timed out.
    pub output: String,
    /// Process exit code; `-1` when the process was killed or never reported one.
    pub exit_code: i32,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn completed(output: impl Into<String>, exit_code: i32, duration: Duration) -> Self {
        Self {
            output: output.into(),
            exit_code,
            duration_ms: duration.as_millis() as u64,
            timed_out: false,
        }
    }

    pub fn timed_out(partial_output: impl Into<String>, duration: Duration) -> Self {
        Self {
            output: partial_output.into(),
            exit_code: -1,
            duration_ms: duration.as_millis() as u64,
            timed_out: true,
        }
    }

    /// Exit code 0 and no timeout.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// One recorded tool invocation. Appended in call order, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallEvent {
    pub tool_name: String,
    #[serde(default)]
    pub input: BTreeMap<String, Value>,
    /// Raw tool output; absent when the call failed before producing any.
    #[serde(default)]
    pub output: Option<String>,
    pub success: bool,
}

impl ToolCallEvent {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            input: BTreeMap::new(),
            output: None,
            success: true,
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input.insert(key.into(), value.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    /// Shell command text for generic execution tools (`command` or `cmd` input).
    pub fn command_text(&self) -> Option<&str> {
        self.input
            .get("command")
            .or_else(|| self.input.get("cmd"))
            .and_then(|v| v.as_str())
    }
}

/// Token accounting reported by an agent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Aggregated telemetry for one agent run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    pub id: String,
    pub tool_calls: Vec<ToolCallEvent>,
    pub usage: TokenUsage,
    /// Approximate turn count; see [`crate::harness::count_turns`].
    pub turns: u32,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecutionSummary {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
            turns: 0,
            success: false,
            duration_ms: 0,
            timed_out: false,
            error: None,
        }
    }

    /// A summary for a run that never produced telemetry.
    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(id)
        }
    }

    pub fn record(&mut self, event: ToolCallEvent) {
        self.tool_calls.push(event);
    }

    pub fn tool_call_count(&self) -> usize {
        self.tool_calls.len()
    }

    /// Tool names in call order, duplicates kept.
    pub fn tool_sequence(&self) -> Vec<&str> {
        self.tool_calls.iter().map(|c| c.tool_name.as_str()).collect()
    }

    pub fn tool_frequency(&self) -> BTreeMap<String, usize> {
        let mut freq = BTreeMap::new();
        for call in &self.tool_calls {
            *freq.entry(call.tool_name.clone()).or_insert(0) += 1;
        }
        freq
    }
}

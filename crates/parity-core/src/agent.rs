//! Agent collaborator contract.
//!
//! The engine does not care whether an agent is a subprocess, an in-process
//! loop or a remote API; it only consumes this trait.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ExecutionResult, Result, TokenUsage, ToolCallEvent};

/// An agent that can be asked to carry out a prompt inside a workspace.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Run the agent. `command` is the transport-specific launch command,
    /// `input` the use case prompt.
    ///
    /// A run that exceeds `timeout` must return `Ok` with `timed_out` set,
    /// not an error.
    async fn execute(
        &self,
        command: &str,
        working_dir: &Path,
        input: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult>;

    /// Tool calls recorded during the most recent [`execute`](Self::execute),
    /// in call order.
    async fn tool_calls(&self) -> Vec<ToolCallEvent>;

    /// Token usage of the most recent run.
    async fn usage(&self) -> TokenUsage {
        TokenUsage::default()
    }
}

//! Shared test doubles.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parity_core::domain::{ExecutionResult, Result, TokenUsage, ToolCallEvent};
use parity_core::sandbox::{Sandbox, SandboxResult};
use parity_core::AgentExecutor;

/// Agent that writes canned files into the workspace and reports canned
/// tool calls.
#[derive(Default)]
pub struct ScriptedAgent {
    pub files: Vec<(String, String)>,
    pub output: String,
    pub calls: Vec<ToolCallEvent>,
    pub timed_out: bool,
    pub exit_code: i32,
    pub seen_dirs: Mutex<Vec<PathBuf>>,
    pub executions: AtomicU32,
}

impl ScriptedAgent {
    pub fn new(output: &str) -> Self {
        Self {
            output: output.to_string(),
            ..Default::default()
        }
    }

    pub fn writes(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    pub fn calls(mut self, names: &[&str]) -> Self {
        self.calls = names.iter().map(|n| ToolCallEvent::new(*n)).collect();
        self
    }

    pub fn timing_out(mut self) -> Self {
        self.timed_out = true;
        self
    }

    pub fn executions(&self) -> u32 {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn seen_dirs(&self) -> Vec<PathBuf> {
        self.seen_dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentExecutor for ScriptedAgent {
    async fn execute(
        &self,
        _command: &str,
        working_dir: &Path,
        _input: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.seen_dirs.lock().unwrap().push(working_dir.to_path_buf());
        for (path, content) in &self.files {
            let target = working_dir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, content)?;
        }
        if self.timed_out {
            return Ok(ExecutionResult::timed_out(self.output.clone(), timeout));
        }
        Ok(ExecutionResult::completed(
            self.output.clone(),
            self.exit_code,
            Duration::from_millis(5),
        ))
    }

    async fn tool_calls(&self) -> Vec<ToolCallEvent> {
        self.calls.clone()
    }

    async fn usage(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        }
    }
}

/// Sandbox over a caller-owned directory that counts `close` calls.
pub struct CountingSandbox {
    root: PathBuf,
    running: bool,
    pub closes: Arc<AtomicU32>,
}

impl CountingSandbox {
    pub fn new(root: &Path) -> (Self, Arc<AtomicU32>) {
        let closes = Arc::new(AtomicU32::new(0));
        (
            Self {
                root: root.to_path_buf(),
                running: false,
                closes: Arc::clone(&closes),
            },
            closes,
        )
    }
}

#[async_trait]
impl Sandbox for CountingSandbox {
    async fn start(&mut self) -> SandboxResult<()> {
        self.running = true;
        Ok(())
    }

    async fn exec(
        &self,
        _command: &str,
        _working_dir: Option<&Path>,
        _timeout: Duration,
    ) -> SandboxResult<ExecutionResult> {
        Ok(ExecutionResult::completed("", 0, Duration::ZERO))
    }

    async fn upload_file(&self, _local: &Path, _remote: &Path) -> SandboxResult<()> {
        Ok(())
    }

    async fn download_file(&self, _remote: &Path, _local: &Path) -> SandboxResult<()> {
        Ok(())
    }

    async fn upload_directory(&self, _local: &Path, _remote: &Path) -> SandboxResult<()> {
        Ok(())
    }

    async fn download_directory(&self, _remote: &Path, _local: &Path) -> SandboxResult<()> {
        Ok(())
    }

    fn workspace(&self) -> Option<&Path> {
        self.running.then_some(self.root.as_path())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn close(&mut self) -> SandboxResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.running = false;
        Ok(())
    }
}

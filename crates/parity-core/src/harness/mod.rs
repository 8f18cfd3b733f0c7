//! Test harness: runs one use case against an agent.
//!
//! Each run walks `SETUP → EXECUTE → VALIDATE → PERSIST → TEARDOWN`:
//!
//! - SETUP failure becomes an ERROR result. A partially built workspace is
//!   cleaned up by the workspace manager before the error is returned.
//! - An agent timeout becomes a TIMEOUT result and skips VALIDATE.
//! - VALIDATE runs the [`Jury`]; its verdict decides PASSED or FAILED.
//! - PERSIST writes the raw output to a transcript file (when enabled and
//!   the output is not empty).
//! - TEARDOWN always runs once a workspace exists.
//!
//! Runs never return errors; every outcome is a [`TestResult`].

mod config;
mod result;
mod transcript;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{warn, Instrument};

use crate::agent::AgentExecutor;
use crate::domain::{ConfigError, Result, UseCase};
use crate::jury::{HolisticScorer, JudgeContext, Jury};
use crate::loader::{self, LoadedUseCase};
use crate::obs;
use crate::workspace::{WorkspaceContext, WorkspaceManager};

pub use config::HarnessConfig;
pub use result::{BatchSummary, TestResult, TestStatus};
pub use transcript::{count_turns, sanitize_filename, save_transcript};

/// Label used in logs when none is configured.
pub const DEFAULT_AGENT_LABEL: &str = "agent";

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`TestHarness`]. An executor is required.
#[derive(Default)]
pub struct TestHarnessBuilder {
    config: HarnessConfig,
    executor: Option<Arc<dyn AgentExecutor>>,
    scorer: Option<Arc<dyn HolisticScorer>>,
    workspace_manager: WorkspaceManager,
    label: Option<String>,
}

impl TestHarnessBuilder {
    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn AgentExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Enable holistic judging for use cases with expected-behavior text.
    pub fn scorer(mut self, scorer: Arc<dyn HolisticScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn workspace_manager(mut self, manager: WorkspaceManager) -> Self {
        self.workspace_manager = manager;
        self
    }

    /// Agent label attached to log spans, e.g. `subject` or `reference`.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn build(self) -> std::result::Result<TestHarness, ConfigError> {
        let executor = self.executor.ok_or(ConfigError::MissingExecutor)?;
        self.config.validate()?;
        Ok(TestHarness {
            config: self.config,
            executor,
            scorer: self.scorer,
            workspaces: self.workspace_manager,
            label: self.label.unwrap_or_else(|| DEFAULT_AGENT_LABEL.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Sequential use-case runner around an injected [`AgentExecutor`].
pub struct TestHarness {
    config: HarnessConfig,
    executor: Arc<dyn AgentExecutor>,
    scorer: Option<Arc<dyn HolisticScorer>>,
    workspaces: WorkspaceManager,
    label: String,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::default()
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run one use case through every phase.
    pub async fn run(&self, use_case: Arc<UseCase>) -> TestResult {
        let span = obs::run_span(use_case.name(), &self.label);
        self.run_phases(use_case).instrument(span).await
    }

    async fn run_phases(&self, use_case: Arc<UseCase>) -> TestResult {
        let started = Instant::now();
        let name = use_case.name().to_string();
        obs::emit_run_started(&name, &self.label);

        obs::emit_phase(&name, "setup");
        let mut result = match self.workspaces.setup(Arc::clone(&use_case)).await {
            Ok(mut ctx) => {
                let mut result = self.run_in_workspace(&use_case, &ctx).await;
                if !ctx.is_temporary() {
                    result.workspace = ctx.workspace().map(Path::to_path_buf);
                }

                obs::emit_phase(&name, "teardown");
                if self.config.cleanup_workspaces {
                    self.workspaces.cleanup(Some(&mut ctx)).await;
                }
                result
            }
            Err(e) => {
                warn!(use_case = %name, error = %e, "workspace setup failed");
                let mut result = TestResult::error(&name, format!("workspace setup failed: {e}"));
                result.category = use_case.category().to_string();
                result
            }
        };

        result.duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_run_finished(
            &name,
            result.status.as_str(),
            result.duration_ms,
            result.tool_calls.len(),
        );
        result
    }

    async fn run_in_workspace(&self, use_case: &UseCase, ctx: &WorkspaceContext) -> TestResult {
        let mut result = TestResult::new(use_case.name(), use_case.category(), TestStatus::Error);
        let Some(workspace) = ctx.workspace() else {
            result.issues.push("sandbox has no workspace".to_string());
            result.error = Some("sandbox has no workspace".to_string());
            return result;
        };

        // EXECUTE
        obs::emit_phase(use_case.name(), "execute");
        let timeout = Duration::from_secs(use_case.timeout_seconds());
        let execution = match self
            .executor
            .execute(&self.config.agent_command, workspace, use_case.prompt(), timeout)
            .await
        {
            Ok(execution) => execution,
            Err(e) => {
                warn!(use_case = %use_case.name(), error = %e, "agent execution failed");
                result.issues.push(format!("agent execution failed: {e}"));
                result.error = Some(e.to_string());
                return result;
            }
        };

        result.exit_code = Some(execution.exit_code);
        result.output = execution.output;
        result.tool_calls = self.executor.tool_calls().await;
        result.usage = self.executor.usage().await;
        result.turns = count_turns(Some(&result.output));

        if execution.timed_out {
            result.status = TestStatus::Timeout;
            result.issues.push(format!(
                "agent timed out after {}s",
                use_case.timeout_seconds()
            ));
        } else {
            // VALIDATE
            obs::emit_phase(use_case.name(), "validate");
            let jury = Jury::build(use_case, self.scorer.clone());
            let judge_ctx = JudgeContext {
                use_case,
                workspace,
                output: &result.output,
            };
            let verdict = jury.evaluate(&judge_ctx).await;
            obs::emit_verdict_evaluated(
                use_case.name(),
                verdict.weighted_score(),
                verdict.confidence(),
                verdict.passed(),
            );

            result.status = if verdict.passed() {
                TestStatus::Passed
            } else {
                TestStatus::Failed
            };
            result.issues.extend(verdict.issues());
            if result.turns > use_case.max_turns() {
                result.issues.push(format!(
                    "estimated {} turns exceeds max_turns {}",
                    result.turns,
                    use_case.max_turns()
                ));
            }
            result.verdict = Some(verdict);
        }

        // PERSIST
        self.persist(use_case, &mut result);
        result
    }

    fn persist(&self, use_case: &UseCase, result: &mut TestResult) {
        if !self.config.save_transcripts || result.output.trim().is_empty() {
            return;
        }
        obs::emit_phase(use_case.name(), "persist");
        match save_transcript(&self.config.transcript_dir, use_case.name(), &result.output) {
            Ok(path) => result.transcript_path = Some(path),
            Err(e) => {
                warn!(use_case = %use_case.name(), error = %e, "failed to save transcript");
                result.issues.push(format!("could not save transcript: {e}"));
            }
        }
    }

    /// Run use cases one after another.
    pub async fn run_batch<I>(&self, use_cases: I) -> Vec<TestResult>
    where
        I: IntoIterator<Item = Arc<UseCase>>,
    {
        let mut results = Vec::new();
        for use_case in use_cases {
            results.push(self.run(use_case).await);
        }
        results
    }

    /// Load and run every use case under `dir`. Files that fail to load
    /// become ERROR results; only an unreadable `dir` is an error.
    pub async fn run_all(&self, dir: &Path) -> Result<Vec<TestResult>> {
        let loaded = loader::load_dir(dir, self.config.load_defaults())?;
        Ok(self.run_loaded(loaded, None).await)
    }

    /// Like [`run_all`](Self::run_all), restricted to one category
    /// (case-insensitive). Files that fail to load cannot be attributed to
    /// a category and are reported in every category run.
    pub async fn run_category(&self, dir: &Path, category: &str) -> Result<Vec<TestResult>> {
        let loaded = loader::load_dir(dir, self.config.load_defaults())?;
        Ok(self.run_loaded(loaded, Some(category)).await)
    }

    async fn run_loaded(&self, loaded: Vec<LoadedUseCase>, category: Option<&str>) -> Vec<TestResult> {
        let mut results = Vec::new();
        for LoadedUseCase { path, result } in loaded {
            match result {
                Ok(use_case) => {
                    if category.is_some_and(|c| !use_case.category().eq_ignore_ascii_case(c)) {
                        continue;
                    }
                    results.push(self.run(Arc::new(use_case)).await);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "use case failed to load");
                    results.push(TestResult::error(path.display().to_string(), e.to_string()));
                }
            }
        }
        results
    }
}

impl std::fmt::Debug for TestHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHarness")
            .field("config", &self.config)
            .field("label", &self.label)
            .field("holistic", &self.scorer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_executor() {
        let err = TestHarness::builder().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingExecutor);
    }
}

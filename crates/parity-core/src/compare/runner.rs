//! Subject-versus-reference comparison runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cache::ReferenceCache;
use super::report::ComparisonReport;
use crate::agent::AgentExecutor;
use crate::domain::{ConfigError, ExecutionSummary, Result, UseCase};
use crate::harness::{HarnessConfig, TestHarness, TestResult, TestStatus};
use crate::loader::{self, LoadDefaults};
use crate::obs;
use crate::workspace::WorkspaceManager;

pub const SUBJECT_LABEL: &str = "subject";
pub const REFERENCE_LABEL: &str = "reference";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    pub subject_command: String,
    pub reference_command: String,
    /// Reuse successful reference runs stored here.
    pub cache_dir: Option<PathBuf>,
    /// Judge each run against the use case's criteria. When false, a run
    /// succeeds if the agent exits 0 within its time budget.
    pub validate_runs: bool,
    /// Save transcripts under `<dir>/subject` and `<dir>/reference`.
    pub transcript_dir: Option<PathBuf>,
    /// Close workspaces after each run; see [`HarnessConfig::cleanup_workspaces`].
    pub cleanup_workspaces: bool,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            subject_command: String::new(),
            reference_command: String::new(),
            cache_dir: None,
            validate_runs: true,
            transcript_dir: None,
            cleanup_workspaces: true,
        }
    }
}

impl ComparisonConfig {
    fn harness_config(&self, label: &str, command: &str) -> HarnessConfig {
        HarnessConfig {
            agent_command: command.to_string(),
            save_transcripts: self.transcript_dir.is_some(),
            cleanup_workspaces: self.cleanup_workspaces,
            transcript_dir: self
                .transcript_dir
                .as_ref()
                .map_or_else(|| PathBuf::from("transcripts").join(label), |d| d.join(label)),
            ..HarnessConfig::default()
        }
    }
}

/// Runs every use case through a subject and a reference agent, each in
/// its own fresh workspace.
pub struct ComparisonRunner {
    subject: TestHarness,
    reference: TestHarness,
    cache: Option<ReferenceCache>,
    validate_runs: bool,
}

impl ComparisonRunner {
    pub fn new(
        config: ComparisonConfig,
        subject: Arc<dyn AgentExecutor>,
        reference: Arc<dyn AgentExecutor>,
    ) -> std::result::Result<Self, ConfigError> {
        let subject = TestHarness::builder()
            .config(config.harness_config(SUBJECT_LABEL, &config.subject_command))
            .executor(subject)
            .label(SUBJECT_LABEL)
            .workspace_manager(WorkspaceManager::scoped(SUBJECT_LABEL))
            .build()?;
        let reference = TestHarness::builder()
            .config(config.harness_config(REFERENCE_LABEL, &config.reference_command))
            .executor(reference)
            .label(REFERENCE_LABEL)
            .workspace_manager(WorkspaceManager::scoped(REFERENCE_LABEL))
            .build()?;
        Ok(Self {
            subject,
            reference,
            cache: config.cache_dir.map(ReferenceCache::new),
            validate_runs: config.validate_runs,
        })
    }

    /// Run `use_case` through both agents and compare.
    pub async fn compare(&self, use_case: Arc<UseCase>) -> ComparisonReport {
        let subject_run = self.subject.run(Arc::clone(&use_case)).await;
        let subject = self.summarize(&subject_run, SUBJECT_LABEL);

        let cached = self.cache.as_ref().and_then(|c| c.load(use_case.name()));
        let reference_cached = cached.is_some();
        let reference = match cached {
            Some(summary) => summary,
            None => {
                let reference_run = self.reference.run(Arc::clone(&use_case)).await;
                let summary = self.summarize(&reference_run, REFERENCE_LABEL);
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.store(use_case.name(), &summary) {
                        warn!(use_case = %use_case.name(), error = %e, "failed to cache reference run");
                    }
                }
                summary
            }
        };

        let report = ComparisonReport::new(&use_case, subject, reference)
            .with_reference_cached(reference_cached);
        obs::emit_comparison_finished(
            &report.use_case,
            report.tool_usage.jaccard,
            report.has_tool_gap(),
        );
        report
    }

    /// Compare use cases one after another.
    pub async fn compare_all<I>(&self, use_cases: I) -> Vec<ComparisonReport>
    where
        I: IntoIterator<Item = Arc<UseCase>>,
    {
        let mut reports = Vec::new();
        for use_case in use_cases {
            reports.push(self.compare(use_case).await);
        }
        reports
    }

    /// Load and compare every use case under `dir`. Files that fail to
    /// load are logged and skipped.
    pub async fn compare_dir(&self, dir: &Path, defaults: LoadDefaults) -> Result<Vec<ComparisonReport>> {
        let use_cases = load_use_cases(dir, defaults)?;
        Ok(self.compare_all(use_cases).await)
    }

    fn summarize(&self, run: &TestResult, label: &str) -> ExecutionSummary {
        let mut summary = run.to_summary(label);
        if !self.validate_runs {
            summary.success = run.exit_code == Some(0)
                && !matches!(run.status, TestStatus::Timeout | TestStatus::Error);
        }
        summary
    }
}

/// Load every use case under `dir`, dropping (and logging) the ones that
/// fail to load.
pub fn load_use_cases(dir: &Path, defaults: LoadDefaults) -> Result<Vec<Arc<UseCase>>> {
    let loaded = loader::load_dir(dir, defaults)?;
    let total = loaded.len();
    let use_cases: Vec<Arc<UseCase>> = loaded
        .into_iter()
        .filter_map(|l| match l.result {
            Ok(uc) => Some(Arc::new(uc)),
            Err(e) => {
                warn!(path = %l.path.display(), error = %e, "skipping use case");
                None
            }
        })
        .collect();
    info!(dir = %dir.display(), loaded = use_cases.len(), total, "use cases loaded");
    Ok(use_cases)
}

impl std::fmt::Debug for ComparisonRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonRunner")
            .field("subject", &self.subject)
            .field("reference", &self.reference)
            .field("cache", &self.cache)
            .field("validate_runs", &self.validate_runs)
            .finish()
    }
}

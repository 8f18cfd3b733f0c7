//! Test results and batch summaries.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{ExecutionSummary, TokenUsage, ToolCallEvent, Verdict};

/// Final state of one use-case run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Passed,
    Failed,
    /// The agent exceeded its time budget. Not an error.
    Timeout,
    /// Setup, agent invocation or loading failed.
    Error,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Timeout => "TIMEOUT",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one use-case run. Every run produces one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    pub use_case: String,
    #[serde(default)]
    pub category: String,
    pub status: TestStatus,
    /// Human-readable problems: failed judgments, timeouts, errors.
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub verdict: Option<Verdict>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Estimated, see [`count_turns`](super::count_turns).
    #[serde(default)]
    pub turns: u32,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallEvent>,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,
    /// Set for fixed workspaces, which stay on disk after the run.
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    #[serde(default)]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl TestResult {
    pub(crate) fn new(use_case: impl Into<String>, category: impl Into<String>, status: TestStatus) -> Self {
        Self {
            use_case: use_case.into(),
            category: category.into(),
            status,
            issues: Vec::new(),
            verdict: None,
            output: String::new(),
            exit_code: None,
            turns: 0,
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
            transcript_path: None,
            workspace: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// An ERROR result for a run that never got going.
    pub fn error(use_case: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        let mut result = Self::new(use_case, "", TestStatus::Error);
        result.issues.push(error.clone());
        result.error = Some(error);
        result
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }

    /// Unweighted judgment pass fraction; zero without a verdict.
    pub fn confidence(&self) -> f64 {
        self.verdict.as_ref().map_or(0.0, Verdict::confidence)
    }

    /// Telemetry view of this run, labelled `id`.
    pub fn to_summary(&self, id: impl Into<String>) -> ExecutionSummary {
        ExecutionSummary {
            id: id.into(),
            tool_calls: self.tool_calls.clone(),
            usage: self.usage,
            turns: self.turns,
            success: self.passed(),
            duration_ms: self.duration_ms,
            timed_out: self.status == TestStatus::Timeout,
            error: self.error.clone(),
        }
    }
}

/// Status counts over a batch of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timeout: usize,
    pub error: usize,
    pub duration_ms: u64,
}

impl BatchSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            acc.total += 1;
            acc.duration_ms += r.duration_ms;
            match r.status {
                TestStatus::Passed => acc.passed += 1,
                TestStatus::Failed => acc.failed += 1,
                TestStatus::Timeout => acc.timeout += 1,
                TestStatus::Error => acc.error += 1,
            }
            acc
        })
    }

    /// Fraction of runs that passed; zero for an empty batch.
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }

    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

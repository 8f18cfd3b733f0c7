//! Comparison report pairing a subject run with a reference run.

use serde::{Deserialize, Serialize};

use super::behavior::BehavioralAnalysis;
use super::tool_usage::ToolUsageComparison;
use crate::domain::{ExecutionSummary, UseCase};

/// Who passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    BothPassed,
    BothFailed,
    OnlySubjectPassed,
    OnlyReferencePassed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub use_case: String,
    #[serde(default)]
    pub category: String,
    pub subject: ExecutionSummary,
    pub reference: ExecutionSummary,
    pub tool_usage: ToolUsageComparison,
    pub behavior: BehavioralAnalysis,
    /// Human-readable differences, most significant first.
    pub differences: Vec<String>,
    /// The reference summary came from the cache.
    #[serde(default)]
    pub reference_cached: bool,
}

impl ComparisonReport {
    pub fn new(use_case: &UseCase, subject: ExecutionSummary, reference: ExecutionSummary) -> Self {
        let tool_usage = ToolUsageComparison::from_summaries(&subject, &reference);
        let behavior = BehavioralAnalysis::analyze(&subject, &reference);
        let mut report = Self {
            use_case: use_case.name().to_string(),
            category: use_case.category().to_string(),
            subject,
            reference,
            tool_usage,
            behavior,
            differences: Vec::new(),
            reference_cached: false,
        };
        report.differences = report.compute_differences();
        report
    }

    pub fn with_reference_cached(mut self, cached: bool) -> Self {
        self.reference_cached = cached;
        self
    }

    pub fn outcome(&self) -> Outcome {
        match (self.subject.success, self.reference.success) {
            (true, true) => Outcome::BothPassed,
            (false, false) => Outcome::BothFailed,
            (true, false) => Outcome::OnlySubjectPassed,
            (false, true) => Outcome::OnlyReferencePassed,
        }
    }

    pub fn both_passed(&self) -> bool {
        self.outcome() == Outcome::BothPassed
    }

    pub fn both_failed(&self) -> bool {
        self.outcome() == Outcome::BothFailed
    }

    pub fn only_subject_passed(&self) -> bool {
        self.outcome() == Outcome::OnlySubjectPassed
    }

    pub fn only_reference_passed(&self) -> bool {
        self.outcome() == Outcome::OnlyReferencePassed
    }

    pub fn has_tool_gap(&self) -> bool {
        self.tool_usage.has_tool_gap()
    }

    /// Subject tool calls per reference tool call. `None` when the
    /// reference made no calls.
    pub fn tool_call_ratio(&self) -> Option<f64> {
        ratio(self.subject.tool_call_count() as f64, self.reference.tool_call_count() as f64)
    }

    /// Subject wall time over reference wall time.
    pub fn duration_ratio(&self) -> Option<f64> {
        ratio(self.subject.duration_ms as f64, self.reference.duration_ms as f64)
    }

    fn compute_differences(&self) -> Vec<String> {
        let mut out = Vec::new();
        match self.outcome() {
            Outcome::OnlyReferencePassed => out.push("subject failed where reference passed".to_string()),
            Outcome::OnlySubjectPassed => out.push("subject passed where reference failed".to_string()),
            Outcome::BothPassed | Outcome::BothFailed => {}
        }
        if self.subject.timed_out && !self.reference.timed_out {
            out.push("subject timed out".to_string());
        }
        if !self.tool_usage.reference_only.is_empty() {
            out.push(format!(
                "tools used only by reference: {}",
                join(&self.tool_usage.reference_only)
            ));
        }
        if !self.tool_usage.subject_only.is_empty() {
            out.push(format!(
                "tools used only by subject: {}",
                join(&self.tool_usage.subject_only)
            ));
        }
        let (s, r) = (self.subject.tool_call_count(), self.reference.tool_call_count());
        if s != r {
            out.push(format!("tool calls: subject {s}, reference {r}"));
        }
        out.extend(self.behavior.divergences());
        if self.subject.turns != self.reference.turns {
            out.push(format!(
                "turns: subject {}, reference {}",
                self.subject.turns, self.reference.turns
            ));
        }
        out
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}

fn join<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

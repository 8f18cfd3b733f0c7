use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::compare::{mean_similarity, ComparisonReport, Outcome};
use crate::harness::{BatchSummary, TestResult};

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Outcome counts across a comparison batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonSummaryArtifact {
    pub total: usize,
    pub both_passed: usize,
    pub both_failed: usize,
    pub only_subject_passed: usize,
    pub only_reference_passed: usize,
    pub with_tool_gap: usize,
    pub mean_similarity: f64,
}

impl ComparisonSummaryArtifact {
    pub fn from_reports(reports: &[ComparisonReport]) -> Self {
        let count = |outcome: Outcome| reports.iter().filter(|r| r.outcome() == outcome).count();
        Self {
            total: reports.len(),
            both_passed: count(Outcome::BothPassed),
            both_failed: count(Outcome::BothFailed),
            only_subject_passed: count(Outcome::OnlySubjectPassed),
            only_reference_passed: count(Outcome::OnlyReferencePassed),
            with_tool_gap: reports.iter().filter(|r| r.has_tool_gap()).count(),
            mean_similarity: mean_similarity(reports),
        }
    }
}

/// Persisted comparison results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonResultsArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub summary: ComparisonSummaryArtifact,
    pub reports: Vec<ComparisonReport>,
}

/// Persisted harness batch results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResultsArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub results: Vec<TestResult>,
}

fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    let content = serde_json::to_string_pretty(value).with_context(|| format!("serialize {what}"))?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Write comparison reports as pretty JSON.
pub fn write_comparison_json(path: &Path, reports: &[ComparisonReport]) -> Result<()> {
    let artifact = ComparisonResultsArtifact {
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        generated_at: Utc::now(),
        summary: ComparisonSummaryArtifact::from_reports(reports),
        reports: reports.to_vec(),
    };
    write_json(path, &artifact, "comparison results")
}

/// Write harness results as pretty JSON.
pub fn write_test_results_json(path: &Path, results: &[TestResult]) -> Result<()> {
    let artifact = TestResultsArtifact {
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        generated_at: Utc::now(),
        summary: BatchSummary::from_results(results),
        results: results.to_vec(),
    };
    write_json(path, &artifact, "test results")
}

fn list(set: &BTreeSet<String>) -> String {
    if set.is_empty() {
        "(none)".to_string()
    } else {
        set.iter().map(|t| format!("`{t}`")).collect::<Vec<_>>().join(", ")
    }
}

fn pass_label(success: bool) -> &'static str {
    if success {
        "pass"
    } else {
        "fail"
    }
}

/// Render one comparison as markdown.
pub fn render_comparison_md(report: &ComparisonReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Comparison: {}\n\n", report.use_case));

    out.push_str("## Outcome\n");
    out.push_str(&format!(
        "- subject: {} ({} tool calls, {} ms)\n- reference: {} ({} tool calls, {} ms){}\n\n",
        pass_label(report.subject.success),
        report.subject.tool_call_count(),
        report.subject.duration_ms,
        pass_label(report.reference.success),
        report.reference.tool_call_count(),
        report.reference.duration_ms,
        if report.reference_cached { " [cached]" } else { "" },
    ));

    let tools = &report.tool_usage;
    out.push_str("## Tools\n");
    out.push_str(&format!(
        "- jaccard: {:.2}\n- shared: {}\n- subject only: {}\n- reference only: {}\n\n",
        tools.jaccard,
        list(&tools.shared),
        list(&tools.subject_only),
        list(&tools.reference_only),
    ));

    let behavior = &report.behavior;
    out.push_str("## Behavior\n");
    out.push_str(&format!(
        "- phase similarity: {:.2}\n- ends with verification: subject {}, reference {}\n- plans first: subject {}, reference {}\n",
        behavior.similarity,
        behavior.subject.ends_with_verification,
        behavior.reference.ends_with_verification,
        behavior.subject.plans_first,
        behavior.reference.plans_first,
    ));

    if !report.differences.is_empty() {
        out.push_str("\n## Differences\n");
        for d in &report.differences {
            out.push_str(&format!("- {d}\n"));
        }
    }
    out
}

/// Compact plain-text block for terminal output.
pub fn render_summary_block(report: &ComparisonReport) -> String {
    let mut out = format!(
        "{} [{:?}] jaccard={:.2} phases={:.2}",
        report.use_case, report.outcome(), report.tool_usage.jaccard, report.behavior.similarity
    );
    if report.has_tool_gap() {
        out.push_str(&format!(
            "\n  gap: {}",
            report
                .tool_usage
                .reference_only
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    for d in &report.differences {
        out.push_str(&format!("\n  - {d}"));
    }
    out
}

/// Render a harness batch as markdown.
pub fn render_batch_md(results: &[TestResult]) -> String {
    let summary = BatchSummary::from_results(results);
    let mut out = String::new();
    out.push_str("# Test Results\n\n");
    out.push_str(&format!(
        "- total: {}\n- passed: {}\n- failed: {}\n- timeout: {}\n- error: {}\n- pass rate: {:.0}%\n",
        summary.total,
        summary.passed,
        summary.failed,
        summary.timeout,
        summary.error,
        summary.pass_rate() * 100.0
    ));

    if !results.is_empty() {
        out.push_str("\n## Cases\n");
        for r in results {
            out.push_str(&format!("- `{}`: {} ({} ms)\n", r.use_case, r.status, r.duration_ms));
            for issue in &r.issues {
                out.push_str(&format!("  - {issue}\n"));
            }
        }
    }
    out
}

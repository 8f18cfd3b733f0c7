//! Subject/reference comparison.
//!
//! - [`tool_usage`] — Venn sets and Jaccard similarity of tool names
//! - [`behavior`]   — phase classification and positional phase similarity
//! - [`report`]     — `ComparisonReport` tying both together
//! - [`cache`]      — on-disk cache of successful reference runs
//! - [`runner`]     — `ComparisonRunner`, one fresh workspace per run

pub mod behavior;
pub mod cache;
pub mod report;
pub mod runner;
pub mod tool_usage;

pub use behavior::{BehavioralAnalysis, Phase, PhaseProfile};
pub use cache::ReferenceCache;
pub use report::{ComparisonReport, Outcome};
pub use runner::{load_use_cases, ComparisonConfig, ComparisonRunner};
pub use tool_usage::ToolUsageComparison;

/// Mean tool-usage Jaccard over `reports`; 1.0 for an empty batch.
pub fn mean_similarity(reports: &[ComparisonReport]) -> f64 {
    if reports.is_empty() {
        return 1.0;
    }
    reports.iter().map(|r| r.tool_usage.jaccard).sum::<f64>() / reports.len() as f64
}

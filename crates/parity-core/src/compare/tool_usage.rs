//! Set algebra over the tools two agents used.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::ExecutionSummary;

/// Shared and exclusive tools of a subject (A) and reference (B) run.
///
/// Tool names are compared case-insensitively. The reference is treated as
/// ground truth: only tools the reference used and the subject did not
/// count as a gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsageComparison {
    pub subject_tools: BTreeSet<String>,
    pub reference_tools: BTreeSet<String>,
    pub shared: BTreeSet<String>,
    pub subject_only: BTreeSet<String>,
    pub reference_only: BTreeSet<String>,
    /// `|A ∩ B| / |A ∪ B|`; 1.0 when both are empty.
    pub jaccard: f64,
}

fn normalize<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect()
}

impl ToolUsageComparison {
    pub fn new<A, B, S, T>(subject: A, reference: B) -> Self
    where
        A: IntoIterator<Item = S>,
        B: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let subject_tools = normalize(subject);
        let reference_tools = normalize(reference);

        let shared: BTreeSet<String> = subject_tools.intersection(&reference_tools).cloned().collect();
        let subject_only = subject_tools.difference(&reference_tools).cloned().collect();
        let reference_only = reference_tools.difference(&subject_tools).cloned().collect();
        let union = subject_tools.union(&reference_tools).count();
        let jaccard = if union == 0 {
            1.0
        } else {
            shared.len() as f64 / union as f64
        };

        Self {
            subject_tools,
            reference_tools,
            shared,
            subject_only,
            reference_only,
            jaccard,
        }
    }

    pub fn from_summaries(subject: &ExecutionSummary, reference: &ExecutionSummary) -> Self {
        Self::new(subject.tool_sequence(), reference.tool_sequence())
    }

    /// True iff the reference used a tool the subject never did.
    pub fn has_tool_gap(&self) -> bool {
        !self.reference_only.is_empty()
    }
}

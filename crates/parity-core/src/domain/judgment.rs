//! Judgments and verdicts produced by the jury.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A judge's score, either a boolean check or a value on a bounded scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Score {
    Boolean { value: bool },
    Scale { value: f64, max: f64 },
}

impl Score {
    /// Score mapped onto `[0, 1]`.
    pub fn normalized(&self) -> f64 {
        match *self {
            Score::Boolean { value } => {
                if value {
                    1.0
                } else {
                    0.0
                }
            }
            Score::Scale { value, max } => {
                if max <= 0.0 {
                    0.0
                } else {
                    (value / max).clamp(0.0, 1.0)
                }
            }
        }
    }
}

/// Result of a single criterion evaluation. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Judgment {
    pub name: String,
    pub passed: bool,
    pub score: Score,
    pub reasoning: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Judgment {
    pub fn pass(name: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            score: Score::Boolean { value: true },
            reasoning: reasoning.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn fail(name: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            score: Score::Boolean { value: false },
            reasoning: reasoning.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn check(name: impl Into<String>, passed: bool, reasoning: impl Into<String>) -> Self {
        if passed {
            Self::pass(name, reasoning)
        } else {
            Self::fail(name, reasoning)
        }
    }

    pub fn scored(
        name: impl Into<String>,
        score: Score,
        passed: bool,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed,
            score,
            reasoning: reasoning.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Weighted aggregation of individual judgments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    /// Combined judgment; its score is the normalized weighted average.
    pub aggregated: Judgment,
    /// Individual judgments in jury order.
    pub judgments: Vec<Judgment>,
    pub by_name: BTreeMap<String, Judgment>,
    pub weights: BTreeMap<String, f64>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.aggregated.passed
    }

    /// Weighted average score in `[0, 1]`.
    pub fn weighted_score(&self) -> f64 {
        self.aggregated.score.normalized()
    }

    /// Unweighted fraction of individual judgments that passed.
    ///
    /// Independent of the weights, so "most checks passed" can be told apart
    /// from "the heavily weighted checks passed". An empty verdict has
    /// confidence 1.0.
    pub fn confidence(&self) -> f64 {
        if self.judgments.is_empty() {
            return 1.0;
        }
        let passed = self.judgments.iter().filter(|j| j.passed).count();
        passed as f64 / self.judgments.len() as f64
    }

    /// Reasoning strings of the failed judgments.
    pub fn issues(&self) -> Vec<String> {
        self.judgments
            .iter()
            .filter(|j| !j.passed)
            .map(|j| format!("{}: {}", j.name, j.reasoning))
            .collect()
    }
}

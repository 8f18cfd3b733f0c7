//! Verdict aggregation: independent judges combined under per-judge weights.
//!
//! A [`Jury`] is built once per use case. Each [`SuccessCriterion`] is
//! resolved into a [`CriterionJudge`]; unknown or malformed criteria are
//! logged and skipped. A use case without criteria gets a single
//! [`AlwaysPassJudge`]. When a [`HolisticScorer`] is available and the use
//! case carries expected-behavior text, a [`HolisticJudge`] is added with a
//! dominant weight.
//!
//! The aggregated score is the weighted mean of the normalized individual
//! scores; it passes when it reaches [`PASS_THRESHOLD`]. Confidence is the
//! unweighted pass fraction (see [`Verdict::confidence`]).

pub mod compile;
pub mod criteria;
pub mod exceptions;
pub mod holistic;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::{Judgment, Score, SuccessCriterion, UseCase, Verdict};

pub use compile::Language;
pub use criteria::{CriterionError, CriterionJudge, CriterionKind};
pub use exceptions::{find_exception, ExceptionMarker};
pub use holistic::{
    parse_score_response, HolisticJudge, HolisticRequest, HolisticScore, HolisticScorer,
};

/// Weighted score an aggregated verdict must reach to pass.
pub const PASS_THRESHOLD: f64 = 0.7;

/// Weight of the holistic judge; dominates any single deterministic check.
pub const WEIGHT_HOLISTIC: f64 = 5.0;

/// Weight of the placeholder judge installed for criteria-less use cases.
pub const WEIGHT_ALWAYS_PASS: f64 = 1.0;

/// Name of the aggregated judgment inside a [`Verdict`].
pub const AGGREGATE_NAME: &str = "jury";

/// What a judge gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct JudgeContext<'a> {
    pub use_case: &'a UseCase,
    pub workspace: &'a Path,
    /// Raw captured agent output.
    pub output: &'a str,
}

/// A single pass/fail/score predicate over an execution outcome.
///
/// Judges never fail: an evaluation fault becomes a failing [`Judgment`]
/// whose reasoning explains what went wrong.
#[async_trait]
pub trait Judge: Send + Sync {
    fn name(&self) -> &str;

    async fn judge(&self, ctx: &JudgeContext<'_>) -> Judgment;
}

/// Placeholder for use cases that declare no criteria.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPassJudge;

#[async_trait]
impl Judge for AlwaysPassJudge {
    fn name(&self) -> &str {
        "always_pass"
    }

    async fn judge(&self, _ctx: &JudgeContext<'_>) -> Judgment {
        Judgment::pass(self.name(), "no success criteria declared")
    }
}

struct Seat {
    judge: Box<dyn Judge>,
    weight: f64,
}

/// An ordered panel of weighted judges.
#[derive(Default)]
pub struct Jury {
    seats: Vec<Seat>,
}

impl Jury {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the jury for `use_case`.
    pub fn build(use_case: &UseCase, scorer: Option<Arc<dyn HolisticScorer>>) -> Self {
        let mut jury = Self::new();

        for criterion in use_case.success_criteria() {
            match CriterionKind::parse(criterion) {
                Ok(kind) => {
                    let weight = kind.weight();
                    jury = jury.with_judge(CriterionJudge::new(kind), weight);
                }
                Err(e) => skip_criterion(use_case, criterion, &e),
            }
        }

        if jury.is_empty() {
            jury = jury.with_judge(AlwaysPassJudge, WEIGHT_ALWAYS_PASS);
        }

        if let (Some(scorer), Some(expected)) = (scorer, use_case.expected_behavior()) {
            jury = jury.with_judge(HolisticJudge::new(scorer, expected), WEIGHT_HOLISTIC);
        }
        jury
    }

    /// Seat another judge. Negative or NaN weights are clamped to zero.
    pub fn with_judge(mut self, judge: impl Judge + 'static, weight: f64) -> Self {
        let weight = if weight.is_nan() { 0.0 } else { weight.max(0.0) };
        self.seats.push(Seat {
            judge: Box::new(judge),
            weight,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Judge names in seating order.
    pub fn judge_names(&self) -> Vec<&str> {
        self.seats.iter().map(|s| s.judge.name()).collect()
    }

    /// Run every judge in order and aggregate.
    pub async fn evaluate(&self, ctx: &JudgeContext<'_>) -> Verdict {
        let mut weighted = Vec::with_capacity(self.seats.len());
        for seat in &self.seats {
            let judgment = seat.judge.judge(ctx).await;
            debug!(
                judge = %judgment.name,
                passed = judgment.passed,
                weight = seat.weight,
                "judgment"
            );
            weighted.push((judgment, seat.weight));
        }
        aggregate(weighted)
    }
}

impl std::fmt::Debug for Jury {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jury")
            .field("judges", &self.judge_names())
            .finish()
    }
}

fn skip_criterion(use_case: &UseCase, criterion: &SuccessCriterion, err: &CriterionError) {
    warn!(
        use_case = %use_case.name(),
        kind = %criterion.kind(),
        error = %err,
        "skipping success criterion"
    );
}

/// Combine weighted judgments into a [`Verdict`].
///
/// Weights are normalized here, so they need not sum to one. When every
/// weight is zero the plain mean is used. An empty input yields a passing
/// verdict.
pub fn aggregate(weighted: Vec<(Judgment, f64)>) -> Verdict {
    if weighted.is_empty() {
        return Verdict {
            aggregated: Judgment::pass(AGGREGATE_NAME, "no judges configured; passing by default")
                .with_metadata("confidence", 1.0)
                .with_metadata("weighted_score", 1.0)
                .with_metadata("loss", 0.0),
            judgments: Vec::new(),
            by_name: BTreeMap::new(),
            weights: BTreeMap::new(),
        };
    }

    let total_weight: f64 = weighted.iter().map(|(_, w)| *w).sum();
    let score = if total_weight > 0.0 {
        weighted
            .iter()
            .map(|(j, w)| j.score.normalized() * w)
            .sum::<f64>()
            / total_weight
    } else {
        weighted.iter().map(|(j, _)| j.score.normalized()).sum::<f64>() / weighted.len() as f64
    };

    let mut judgments = Vec::with_capacity(weighted.len());
    let mut by_name = BTreeMap::new();
    let mut weights = BTreeMap::new();
    for (mut judgment, weight) in weighted {
        judgment.name = unique_name(&by_name, &judgment.name);
        by_name.insert(judgment.name.clone(), judgment.clone());
        weights.insert(judgment.name.clone(), weight);
        judgments.push(judgment);
    }

    let passed_count = judgments.iter().filter(|j| j.passed).count();
    let confidence = passed_count as f64 / judgments.len() as f64;
    let passed = score >= PASS_THRESHOLD;
    let reasoning = format!(
        "{passed_count}/{} judges passed; weighted score {score:.2} {} threshold {PASS_THRESHOLD:.2}",
        judgments.len(),
        if passed { "meets" } else { "is below" },
    );

    let aggregated = Judgment::scored(
        AGGREGATE_NAME,
        Score::Scale {
            value: score,
            max: 1.0,
        },
        passed,
        reasoning,
    )
    .with_metadata("confidence", confidence)
    .with_metadata("weighted_score", score)
    .with_metadata("loss", 1.0 - score);

    Verdict {
        aggregated,
        judgments,
        by_name,
        weights,
    }
}

fn unique_name(taken: &BTreeMap<String, Judgment>, name: &str) -> String {
    if !taken.contains_key(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{name} #{n}"))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or_else(|| name.to_string())
}

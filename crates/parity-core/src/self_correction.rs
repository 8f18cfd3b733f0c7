//! Self-correction loop: repeated comparison batches tracked by loss.
//!
//! Each iteration runs a [`ComparisonBatch`], takes the mean tool-usage
//! Jaccard similarity as its headline metric and derives
//! `loss = 1 - similarity`. The loop stops when the loss reaches the target,
//! after `patience` consecutive iterations without a loss decrease, or at
//! the iteration cap. An unchanged loss counts as no improvement.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::compare::{mean_similarity, ComparisonReport, ComparisonRunner};
use crate::domain::{Result, UseCase};
use crate::obs;

/// One round of comparisons.
#[async_trait]
pub trait ComparisonBatch: Send + Sync {
    async fn run_batch(&self, iteration: u32) -> Result<Vec<ComparisonReport>>;
}

/// Produces a qualitative analysis of an iteration, e.g. by asking a model
/// what the subject is missing. Returning `None` records no analysis.
#[async_trait]
pub trait IterationAnalyst: Send + Sync {
    async fn analyze(&self, iteration: &IterationResult, reports: &[ComparisonReport]) -> Option<Value>;
}

/// A [`ComparisonRunner`] over a fixed set of use cases.
pub struct RunnerBatch {
    runner: ComparisonRunner,
    use_cases: Vec<Arc<UseCase>>,
}

impl RunnerBatch {
    pub fn new(runner: ComparisonRunner, use_cases: Vec<Arc<UseCase>>) -> Self {
        Self { runner, use_cases }
    }
}

#[async_trait]
impl ComparisonBatch for RunnerBatch {
    async fn run_batch(&self, _iteration: u32) -> Result<Vec<ComparisonReport>> {
        Ok(self.runner.compare_all(self.use_cases.iter().cloned()).await)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub target_loss: f64,
    pub max_iterations: u32,
    /// Consecutive non-improving iterations tolerated before stopping.
    pub patience: u32,
    /// Write the iteration history here after every iteration.
    pub history_path: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_loss: 0.05,
            max_iterations: 10,
            patience: 3,
            history_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    /// 1-based.
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
    pub total_tests: usize,
    pub tests_with_gap: usize,
    pub similarity: f64,
    pub loss: f64,
    #[serde(default)]
    pub analysis: Option<Value>,
    /// Previous loss minus this loss; positive means better. Zero for the
    /// first iteration.
    pub improvement: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    Stagnated,
    MaxIterations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopOutcome {
    pub iterations: Vec<IterationResult>,
    pub stop_reason: StopReason,
}

impl LoopOutcome {
    pub fn final_loss(&self) -> Option<f64> {
        self.iterations.last().map(|i| i.loss)
    }

    pub fn best_loss(&self) -> Option<f64> {
        self.iterations.iter().map(|i| i.loss).reduce(f64::min)
    }
}

pub struct SelfCorrectionLoop<B> {
    config: LoopConfig,
    batch: B,
    analyst: Option<Box<dyn IterationAnalyst>>,
}

impl<B: ComparisonBatch> SelfCorrectionLoop<B> {
    pub fn new(config: LoopConfig, batch: B) -> Self {
        Self {
            config,
            batch,
            analyst: None,
        }
    }

    pub fn with_analyst(mut self, analyst: impl IterationAnalyst + 'static) -> Self {
        self.analyst = Some(Box::new(analyst));
        self
    }

    /// Iterate until a stop condition holds. Fails only if a batch fails.
    pub async fn run(&self) -> Result<LoopOutcome> {
        let mut iterations: Vec<IterationResult> = Vec::new();
        let mut stale = 0u32;
        let max = self.config.max_iterations.max(1);

        for iteration in 1..=max {
            let reports = self.batch.run_batch(iteration).await?;
            let similarity = mean_similarity(&reports);
            let loss = 1.0 - similarity;
            let improvement = iterations.last().map_or(0.0, |prev| prev.loss - loss);

            let mut result = IterationResult {
                iteration,
                timestamp: Utc::now(),
                total_tests: reports.len(),
                tests_with_gap: reports.iter().filter(|r| r.has_tool_gap()).count(),
                similarity,
                loss,
                analysis: None,
                improvement,
            };
            if let Some(analyst) = &self.analyst {
                result.analysis = analyst.analyze(&result, &reports).await;
            }
            obs::emit_loop_iteration(iteration, similarity, loss, improvement);

            if iteration > 1 && improvement <= 0.0 {
                stale += 1;
            } else {
                stale = 0;
            }
            iterations.push(result);

            if let Some(path) = &self.config.history_path {
                if let Err(e) = write_history(path, &iterations) {
                    warn!(path = %path.display(), error = %e, "failed to write loop history");
                }
            }

            let stop = if loss <= self.config.target_loss {
                Some(StopReason::TargetReached)
            } else if stale >= self.config.patience {
                Some(StopReason::Stagnated)
            } else {
                None
            };
            if let Some(stop_reason) = stop {
                info!(iteration, loss, reason = ?stop_reason, "self-correction loop stopped");
                return Ok(LoopOutcome {
                    iterations,
                    stop_reason,
                });
            }
        }

        info!(iterations = iterations.len(), "self-correction loop hit iteration cap");
        Ok(LoopOutcome {
            iterations,
            stop_reason: StopReason::MaxIterations,
        })
    }
}

/// Write the iteration list as pretty JSON.
pub fn write_history(path: &Path, iterations: &[IterationResult]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    let content = serde_json::to_string_pretty(iterations).context("serialize loop history")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

//! Self-correction loop stop conditions with scripted batches.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parity_core::domain::{ExecutionSummary, Result, ToolCallEvent};
use parity_core::self_correction::{IterationAnalyst, IterationResult};
use parity_core::{
    ComparisonBatch, ComparisonReport, LoopConfig, SelfCorrectionLoop, StopReason, UseCase,
};
use serde_json::{json, Value};

fn summary(tools: &[&str]) -> ExecutionSummary {
    let mut s = ExecutionSummary::new("run");
    s.success = true;
    for t in tools {
        s.record(ToolCallEvent::new(*t));
    }
    s
}

/// One report per iteration whose Jaccard is `similarities[i]` (0, 0.5 or 1).
struct ScriptedBatch {
    similarities: Vec<f64>,
    calls: AtomicU32,
}

impl ScriptedBatch {
    fn new(similarities: &[f64]) -> Self {
        Self {
            similarities: similarities.to_vec(),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ComparisonBatch for ScriptedBatch {
    async fn run_batch(&self, iteration: u32) -> Result<Vec<ComparisonReport>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let idx = (iteration as usize - 1).min(self.similarities.len() - 1);
        let uc = UseCase::builder("case", "p").build()?;
        let subject = match self.similarities[idx] {
            s if s >= 1.0 => summary(&["a", "b"]),
            s if s >= 0.5 => summary(&["a"]),
            _ => summary(&["z"]),
        };
        Ok(vec![ComparisonReport::new(&uc, subject, summary(&["a", "b"]))])
    }
}

#[tokio::test]
async fn test_stops_when_target_reached() {
    let batch = ScriptedBatch::new(&[0.0, 0.5, 1.0]);
    let outcome = SelfCorrectionLoop::new(LoopConfig::default(), batch)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::TargetReached);
    assert_eq!(outcome.iterations.len(), 3);
    assert_eq!(outcome.final_loss(), Some(0.0));
    assert!((outcome.iterations[1].improvement - 0.5).abs() < 1e-9);
    assert_eq!(outcome.iterations[0].tests_with_gap, 1);
}

#[tokio::test]
async fn test_stops_after_three_flat_iterations() {
    let batch = ScriptedBatch::new(&[0.5]);
    let outcome = SelfCorrectionLoop::new(LoopConfig::default(), batch)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Stagnated);
    // First iteration sets the baseline; three non-improving ones follow.
    assert_eq!(outcome.iterations.len(), 4);
}

#[tokio::test]
async fn test_iteration_cap() {
    let config = LoopConfig {
        max_iterations: 2,
        ..Default::default()
    };
    let outcome = SelfCorrectionLoop::new(config, ScriptedBatch::new(&[0.0, 0.5]))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
    assert_eq!(outcome.iterations.len(), 2);
}

struct CountingAnalyst(Arc<AtomicU32>);

#[async_trait]
impl IterationAnalyst for CountingAnalyst {
    async fn analyze(&self, iteration: &IterationResult, _reports: &[ComparisonReport]) -> Option<Value> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Some(json!({"iteration": iteration.iteration}))
    }
}

#[tokio::test]
async fn test_history_written_and_analysis_attached() {
    let dir = tempfile::tempdir().unwrap();
    let history = dir.path().join("history/loop.json");
    let config = LoopConfig {
        history_path: Some(history.clone()),
        ..Default::default()
    };
    let analyzed = Arc::new(AtomicU32::new(0));
    let outcome = SelfCorrectionLoop::new(config, ScriptedBatch::new(&[0.5, 1.0]))
        .with_analyst(CountingAnalyst(Arc::clone(&analyzed)))
        .run()
        .await
        .unwrap();

    assert_eq!(analyzed.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.iterations[1].analysis, Some(json!({"iteration": 2})));

    let written: Vec<IterationResult> =
        serde_json::from_str(&std::fs::read_to_string(&history).unwrap()).unwrap();
    assert_eq!(written, outcome.iterations);
}

//! Structured observability hooks for harness lifecycle events.
//!
//! This module provides:
//! - Use-case-scoped tracing spans via [`run_span`]
//! - Emission functions for lifecycle events: start, phase, verdict, finish,
//!   comparison, loop iteration, cache lookups
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).

use tracing::{info, Span};

/// Span tagging everything logged during one use-case run.
///
/// Attach it with [`tracing::Instrument`] so it follows the run across
/// `.await` points:
///
/// ```ignore
/// harness.run_phases(uc).instrument(obs::run_span("hello-world", "subject")).await
/// ```
pub fn run_span(use_case: &str, agent: &str) -> Span {
    tracing::info_span!("parity.run", use_case = %use_case, agent = %agent)
}

/// Emit event: run started.
pub fn emit_run_started(use_case: &str, agent: &str) {
    info!(event = "run.started", use_case = %use_case, agent = %agent);
}

/// Emit event: a harness state-machine phase was entered.
pub fn emit_phase(use_case: &str, phase: &str) {
    tracing::debug!(event = "run.phase", use_case = %use_case, phase = %phase);
}

/// Emit event: verdict aggregated.
pub fn emit_verdict_evaluated(use_case: &str, score: f64, confidence: f64, passed: bool) {
    info!(
        event = "verdict.evaluated",
        use_case = %use_case,
        score = score,
        confidence = confidence,
        passed = passed,
    );
}

/// Emit event: run finished with its final status.
pub fn emit_run_finished(use_case: &str, status: &str, duration_ms: u64, tool_calls: usize) {
    info!(
        event = "run.finished",
        use_case = %use_case,
        status = %status,
        duration_ms = duration_ms,
        tool_calls = tool_calls,
    );
}

/// Emit event: subject/reference comparison assembled.
pub fn emit_comparison_finished(use_case: &str, similarity: f64, tool_gap: bool) {
    info!(
        event = "comparison.finished",
        use_case = %use_case,
        similarity = similarity,
        tool_gap = tool_gap,
    );
}

/// Emit event: self-correction loop iteration completed.
pub fn emit_loop_iteration(iteration: u32, similarity: f64, loss: f64, improvement: f64) {
    info!(
        event = "loop.iteration",
        iteration = iteration,
        similarity = similarity,
        loss = loss,
        improvement = improvement,
    );
}

/// Emit event: reference cache lookup.
pub fn emit_cache_lookup(key: &str, hit: bool) {
    if hit {
        info!(event = "cache.hit", key = %key);
    } else {
        tracing::debug!(event = "cache.miss", key = %key);
    }
}

/// Emit event: workspace teardown failed (warning level).
pub fn emit_teardown_error(use_case: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "run.teardown_error", use_case = %use_case, error = %error);
}

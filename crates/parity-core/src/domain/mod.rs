//! Domain models for the parity harness.
//!
//! Canonical definitions for the core entities:
//! - `UseCase`: Immutable task specification run against an agent
//! - `ExecutionResult` / `ToolCallEvent` / `ExecutionSummary`: Run telemetry
//! - `Judgment` / `Verdict`: Evaluation outcomes

pub mod error;
pub mod execution;
pub mod judgment;
pub mod use_case;

// Re-export main types and errors
pub use error::{ConfigError, ParityError, Result};
pub use execution::{ExecutionResult, ExecutionSummary, TokenUsage, ToolCallEvent};
pub use judgment::{Judgment, Score, Verdict};
pub use use_case::{
    QuestionStrategy, Setup, SetupFile, SuccessCriterion, UseCase, UseCaseBuilder,
    DEFAULT_MAX_TURNS, DEFAULT_TIMEOUT_SECONDS,
};

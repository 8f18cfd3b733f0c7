//! Parity Core Library
//!
//! Evaluation and comparison engine for coding agents: sandboxed use-case
//! runs, weighted verdict aggregation, subject/reference comparison and the
//! self-correction loop.

pub mod agent;
pub mod compare;
pub mod domain;
pub mod harness;
pub mod jury;
pub mod loader;
pub mod obs;
pub mod reporting;
pub mod sandbox;
pub mod self_correction;
pub mod telemetry;
pub mod workspace;

pub use agent::AgentExecutor;

pub use domain::{
    ConfigError, ExecutionResult, ExecutionSummary, Judgment, ParityError, Result, Score,
    SuccessCriterion, TokenUsage, ToolCallEvent, UseCase, UseCaseBuilder, Verdict,
};

pub use sandbox::{LocalSandbox, Sandbox, SandboxError, SandboxMode, SandboxResult};

pub use workspace::{WorkspaceContext, WorkspaceManager};

pub use jury::{
    HolisticJudge, HolisticScorer, Judge, JudgeContext, Jury, PASS_THRESHOLD,
};

pub use harness::{
    count_turns, sanitize_filename, BatchSummary, HarnessConfig, TestHarness,
    TestHarnessBuilder, TestResult, TestStatus,
};

pub use loader::{load_dir, load_file, LoadDefaults, LoadedUseCase};

pub use compare::{
    BehavioralAnalysis, ComparisonConfig, ComparisonReport, ComparisonRunner, Phase,
    ReferenceCache, ToolUsageComparison,
};

pub use self_correction::{
    ComparisonBatch, IterationAnalyst, IterationResult, LoopConfig, LoopOutcome, RunnerBatch,
    SelfCorrectionLoop, StopReason,
};

/// Parity version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

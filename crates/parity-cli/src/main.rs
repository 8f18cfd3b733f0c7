//! Parity - agent evaluation and comparison CLI
//!
//! The `parity` command runs declarative use cases against coding agents.
//!
//! ## Commands
//!
//! - `run`: Run a single use case file
//! - `run-all`: Run every use case in a directory, optionally one category
//! - `compare`: Compare a subject agent against a reference agent
//! - `loop`: Repeat comparisons until the parity loss target is reached

mod command_agent;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use command_agent::CommandAgent;
use parity_core::telemetry::LogFormat;
use parity_core::compare::load_use_cases;
use parity_core::reporting::{
    render_batch_md, render_comparison_md, render_summary_block, write_comparison_json,
    write_test_results_json, ComparisonSummaryArtifact,
};
use parity_core::{
    BatchSummary, ComparisonConfig, ComparisonReport, ComparisonRunner, HarnessConfig,
    LoadDefaults, LoopConfig, RunnerBatch, SelfCorrectionLoop, StopReason, TestHarness,
    TestResult,
};

#[derive(Parser)]
#[command(name = "parity")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate coding agents against declarative use cases", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that launches an agent.
#[derive(Args, Debug, Clone)]
struct AgentArgs {
    /// Shell command that runs the (subject) agent
    #[arg(long, env = "PARITY_AGENT_CMD")]
    agent_cmd: String,

    /// Save transcripts under this directory
    #[arg(long, env = "PARITY_TRANSCRIPT_DIR")]
    transcript_dir: Option<PathBuf>,

    /// Default per-use-case timeout in seconds
    #[arg(long, default_value_t = parity_core::domain::DEFAULT_TIMEOUT_SECONDS)]
    timeout: u64,

    /// Default turn limit per use case
    #[arg(long, default_value_t = parity_core::domain::DEFAULT_MAX_TURNS)]
    max_turns: u32,

    /// Leave workspaces on disk after each run
    #[arg(long)]
    keep_workspaces: bool,
}

impl AgentArgs {
    fn harness_config(&self) -> HarnessConfig {
        let defaults = HarnessConfig::default();
        HarnessConfig {
            max_turns: self.max_turns,
            timeout_seconds: self.timeout,
            save_transcripts: self.transcript_dir.is_some(),
            cleanup_workspaces: !self.keep_workspaces,
            transcript_dir: self
                .transcript_dir
                .clone()
                .unwrap_or(defaults.transcript_dir),
            agent_command: self.agent_cmd.clone(),
        }
    }

    fn load_defaults(&self) -> LoadDefaults {
        LoadDefaults {
            max_turns: self.max_turns,
            timeout_seconds: self.timeout,
        }
    }
}

/// Options for commands that run a reference agent next to the subject.
#[derive(Args, Debug, Clone)]
struct ReferenceArgs {
    /// Shell command that runs the reference agent
    #[arg(long, env = "PARITY_REFERENCE_CMD")]
    reference_cmd: String,

    /// Cache successful reference runs in this directory
    #[arg(long, env = "PARITY_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Judge runs by exit code only, skipping success criteria
    #[arg(long)]
    no_validate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single use case file
    Run {
        /// Use case file (YAML or JSON)
        file: PathBuf,

        #[command(flatten)]
        agent: AgentArgs,

        /// Write a report (`.json` for JSON, anything else for Markdown)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run every use case in a directory
    RunAll {
        /// Directory searched recursively for use case files
        dir: PathBuf,

        /// Only run use cases in this category
        #[arg(long)]
        category: Option<String>,

        #[command(flatten)]
        agent: AgentArgs,

        /// Write a report (`.json` for JSON, anything else for Markdown)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Compare the subject agent against a reference agent
    Compare {
        /// Use case file or directory
        path: PathBuf,

        #[command(flatten)]
        agent: AgentArgs,

        #[command(flatten)]
        reference: ReferenceArgs,

        /// Write a report (`.json` for JSON, anything else for Markdown)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Re-run comparisons until the parity loss target is reached
    Loop {
        /// Directory of use cases
        dir: PathBuf,

        #[command(flatten)]
        agent: AgentArgs,

        #[command(flatten)]
        reference: ReferenceArgs,

        /// Stop once loss is at or below this value
        #[arg(long, default_value_t = 0.05)]
        target_loss: f64,

        /// Hard iteration cap
        #[arg(long, default_value_t = 10)]
        max_iterations: u32,

        /// Non-improving iterations tolerated before stopping
        #[arg(long, default_value_t = 3)]
        patience: u32,

        /// Write iteration history JSON here after every iteration
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    parity_core::telemetry::init_tracing(LogFormat::from_json_flag(cli.json), cli.verbose);

    match cli.command {
        Commands::Run {
            file,
            agent,
            report,
        } => cmd_run(&file, &agent, report.as_deref()).await,
        Commands::RunAll {
            dir,
            category,
            agent,
            report,
        } => cmd_run_all(&dir, category.as_deref(), &agent, report.as_deref()).await,
        Commands::Compare {
            path,
            agent,
            reference,
            report,
        } => cmd_compare(&path, &agent, &reference, report.as_deref()).await,
        Commands::Loop {
            dir,
            agent,
            reference,
            target_loss,
            max_iterations,
            patience,
            history,
        } => {
            let config = LoopConfig {
                target_loss,
                max_iterations,
                patience,
                history_path: history,
            };
            cmd_loop(&dir, &agent, &reference, config).await
        }
    }
}

// ---------------------------------------------------------------------------
// Harness runs
// ---------------------------------------------------------------------------

fn build_harness(agent: &AgentArgs) -> Result<TestHarness> {
    TestHarness::builder()
        .config(agent.harness_config())
        .executor(Arc::new(CommandAgent::new()))
        .build()
        .context("Invalid harness configuration")
}

async fn cmd_run(file: &Path, agent: &AgentArgs, report: Option<&Path>) -> Result<()> {
    let use_case = parity_core::load_file(file, agent.load_defaults())
        .with_context(|| format!("Failed to load use case {:?}", file))?;
    let harness = build_harness(agent)?;

    let result = harness.run(Arc::new(use_case)).await;
    print_result(&result);

    let results = [result];
    if let Some(path) = report {
        write_results_report(path, &results)?;
    }
    if results.iter().all(TestResult::passed) {
        Ok(())
    } else {
        anyhow::bail!("Use case did not pass")
    }
}

async fn cmd_run_all(
    dir: &Path,
    category: Option<&str>,
    agent: &AgentArgs,
    report: Option<&Path>,
) -> Result<()> {
    let harness = build_harness(agent)?;
    let results = match category {
        Some(category) => harness.run_category(dir, category).await,
        None => harness.run_all(dir).await,
    }
    .with_context(|| format!("Failed to run use cases in {:?}", dir))?;

    for result in &results {
        print_result(result);
    }
    let summary = BatchSummary::from_results(&results);
    println!();
    println!(
        "Total: {}  Passed: {}  Failed: {}  Timeout: {}  Error: {}  ({:.0}% in {}ms)",
        summary.total,
        summary.passed,
        summary.failed,
        summary.timeout,
        summary.error,
        summary.pass_rate() * 100.0,
        summary.duration_ms
    );

    if let Some(path) = report {
        write_results_report(path, &results)?;
    }
    if summary.all_passed() {
        Ok(())
    } else {
        anyhow::bail!("{} of {} use cases did not pass", summary.total - summary.passed, summary.total)
    }
}

fn print_result(result: &TestResult) {
    let mark = if result.passed() { "✓" } else { "✗" };
    println!(
        "{} {} [{}] {}ms, {} tool calls, confidence {:.2}",
        mark,
        result.use_case,
        result.status,
        result.duration_ms,
        result.tool_calls.len(),
        result.confidence()
    );
    for issue in &result.issues {
        println!("    - {}", issue);
    }
    if let Some(path) = &result.transcript_path {
        println!("    transcript: {}", path.display());
    }
}

fn write_results_report(path: &Path, results: &[TestResult]) -> Result<()> {
    if is_json_path(path) {
        write_test_results_json(path, results)?;
    } else {
        write_text(path, &render_batch_md(results))?;
    }
    info!(path = %path.display(), "report written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Comparisons
// ---------------------------------------------------------------------------

fn comparison_config(agent: &AgentArgs, reference: &ReferenceArgs) -> ComparisonConfig {
    ComparisonConfig {
        subject_command: agent.agent_cmd.clone(),
        reference_command: reference.reference_cmd.clone(),
        cache_dir: reference.cache_dir.clone(),
        validate_runs: !reference.no_validate,
        transcript_dir: agent.transcript_dir.clone(),
        cleanup_workspaces: !agent.keep_workspaces,
    }
}

fn build_runner(agent: &AgentArgs, reference: &ReferenceArgs) -> Result<ComparisonRunner> {
    ComparisonRunner::new(
        comparison_config(agent, reference),
        Arc::new(CommandAgent::new()),
        Arc::new(CommandAgent::new()),
    )
    .context("Invalid comparison configuration")
}

async fn cmd_compare(
    path: &Path,
    agent: &AgentArgs,
    reference: &ReferenceArgs,
    report: Option<&Path>,
) -> Result<()> {
    let runner = build_runner(agent, reference)?;

    let reports = if path.is_dir() {
        runner
            .compare_dir(path, agent.load_defaults())
            .await
            .with_context(|| format!("Failed to compare use cases in {:?}", path))?
    } else {
        let use_case = parity_core::load_file(path, agent.load_defaults())
            .with_context(|| format!("Failed to load use case {:?}", path))?;
        vec![runner.compare(Arc::new(use_case)).await]
    };

    for r in &reports {
        println!("{}", render_summary_block(r));
    }
    let summary = ComparisonSummaryArtifact::from_reports(&reports);
    println!(
        "Compared: {}  Both passed: {}  Only reference passed: {}  Tool gaps: {}  Mean similarity: {:.2}",
        summary.total,
        summary.both_passed,
        summary.only_reference_passed,
        summary.with_tool_gap,
        summary.mean_similarity
    );

    if let Some(path) = report {
        write_comparison_report(path, &reports)?;
    }
    if summary.only_reference_passed == 0 {
        Ok(())
    } else {
        anyhow::bail!(
            "Subject failed {} use case(s) the reference passed",
            summary.only_reference_passed
        )
    }
}

fn write_comparison_report(path: &Path, reports: &[ComparisonReport]) -> Result<()> {
    if is_json_path(path) {
        write_comparison_json(path, reports)?;
    } else {
        let body = reports
            .iter()
            .map(render_comparison_md)
            .collect::<Vec<_>>()
            .join("\n");
        write_text(path, &body)?;
    }
    info!(path = %path.display(), "report written");
    Ok(())
}

async fn cmd_loop(
    dir: &Path,
    agent: &AgentArgs,
    reference: &ReferenceArgs,
    config: LoopConfig,
) -> Result<()> {
    let use_cases = load_use_cases(dir, agent.load_defaults())
        .with_context(|| format!("Failed to load use cases from {:?}", dir))?;
    if use_cases.is_empty() {
        anyhow::bail!("No use cases found in {:?}", dir);
    }
    let runner = build_runner(agent, reference)?;
    let target = config.target_loss;

    let outcome = SelfCorrectionLoop::new(config, RunnerBatch::new(runner, use_cases))
        .run()
        .await
        .context("Self-correction loop failed")?;

    for it in &outcome.iterations {
        println!(
            "Iteration {:>2}: loss {:.3} (similarity {:.3}, {} of {} with tool gaps, improvement {:+.3})",
            it.iteration, it.loss, it.similarity, it.tests_with_gap, it.total_tests, it.improvement
        );
    }
    println!("Stopped: {:?}", outcome.stop_reason);

    match outcome.stop_reason {
        StopReason::TargetReached => Ok(()),
        _ => anyhow::bail!(
            "Target loss {:.3} not reached (best {:.3})",
            target,
            outcome.best_loss().unwrap_or(1.0)
        ),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_all_args_build_harness_config() {
        let cli = Cli::try_parse_from([
            "parity",
            "run-all",
            "cases",
            "--category",
            "files",
            "--agent-cmd",
            "my-agent --fast",
            "--transcript-dir",
            "out/transcripts",
            "--timeout",
            "30",
            "--keep-workspaces",
        ])
        .unwrap();

        let Commands::RunAll {
            dir,
            category,
            agent,
            ..
        } = cli.command
        else {
            panic!("expected run-all");
        };
        assert_eq!(dir, PathBuf::from("cases"));
        assert_eq!(category.as_deref(), Some("files"));

        let config = agent.harness_config();
        assert_eq!(config.agent_command, "my-agent --fast");
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.save_transcripts);
        assert!(!config.cleanup_workspaces);
        assert!(config.validate().is_ok());
        assert_eq!(agent.load_defaults().timeout_seconds, 30);
    }

    #[test]
    fn test_loop_defaults() {
        let cli = Cli::try_parse_from([
            "parity",
            "loop",
            "cases",
            "--agent-cmd",
            "a",
            "--reference-cmd",
            "b",
        ])
        .unwrap();
        let Commands::Loop {
            target_loss,
            max_iterations,
            patience,
            history,
            reference,
            ..
        } = cli.command
        else {
            panic!("expected loop");
        };
        let defaults = LoopConfig::default();
        assert_eq!(target_loss, defaults.target_loss);
        assert_eq!(max_iterations, defaults.max_iterations);
        assert_eq!(patience, defaults.patience);
        assert!(history.is_none());
        assert!(!reference.no_validate);
    }

    #[test]
    fn test_compare_keep_workspaces_reaches_runner_config() {
        let cli = Cli::try_parse_from([
            "parity",
            "compare",
            "cases",
            "--agent-cmd",
            "a",
            "--reference-cmd",
            "b",
            "--keep-workspaces",
            "--no-validate",
        ])
        .unwrap();
        let Commands::Compare {
            agent, reference, ..
        } = cli.command
        else {
            panic!("expected compare");
        };
        let config = comparison_config(&agent, &reference);
        assert!(!config.cleanup_workspaces);
        assert!(!config.validate_runs);
        assert_eq!(config.subject_command, "a");
        assert_eq!(config.reference_command, "b");
    }

    #[test]
    fn test_report_format_by_extension() {
        assert!(is_json_path(Path::new("out/report.json")));
        assert!(is_json_path(Path::new("REPORT.JSON")));
        assert!(!is_json_path(Path::new("report.md")));
        assert!(!is_json_path(Path::new("report")));
    }

    #[test]
    fn test_write_text_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/report.md");
        write_text(&path, "# Report").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Report");
    }
}

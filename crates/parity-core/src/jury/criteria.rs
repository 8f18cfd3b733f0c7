//! Deterministic criteria: typed dispatch over the known criterion kinds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::compile::{find_sources, Language};
use super::exceptions::find_exception;
use super::{Judge, JudgeContext};
use crate::domain::{Judgment, SuccessCriterion};
use crate::sandbox::{confine, fs as sandbox_fs, run_shell};

// Relative weights: content and command checks say more about a run than
// existence or output-substring checks.
pub const WEIGHT_FILE_EXISTS: f64 = 1.0;
pub const WEIGHT_OUTPUT_CONTAINS: f64 = 1.0;
pub const WEIGHT_NO_EXCEPTIONS: f64 = 1.5;
pub const WEIGHT_FILE_CONTAINS: f64 = 2.0;
pub const WEIGHT_COMMAND_SUCCEEDS: f64 = 2.0;
pub const WEIGHT_COMPILES: f64 = 2.0;

/// Longest slice of command output quoted in a failing judgment.
const OUTPUT_EXCERPT: usize = 600;

/// Why a [`SuccessCriterion`] could not be turned into a judge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriterionError {
    #[error("unknown criterion kind: {0}")]
    UnknownKind(String),

    #[error("criterion {kind} expects {expected} argument(s), got {got}")]
    Arity {
        kind: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("criterion compiles names unknown language: {0}")]
    UnknownLanguage(String),
}

/// The known criterion kinds with their arguments resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CriterionKind {
    FileExists { path: String },
    FileContains { path: String, needle: String },
    CommandSucceeds { command: String },
    NoExceptions,
    OutputContains { text: String },
    Compiles { pattern: String, language: Language },
}

impl CriterionKind {
    /// Resolve a data-layer criterion. Kind names are matched
    /// case-insensitively and `-` is accepted for `_`.
    pub fn parse(criterion: &SuccessCriterion) -> Result<Self, CriterionError> {
        let kind = criterion.kind().trim().to_ascii_lowercase().replace('-', "_");
        let args = criterion.args();
        let arity = |kind: &'static str, expected: &'static str| CriterionError::Arity {
            kind,
            expected,
            got: args.len(),
        };

        match kind.as_str() {
            "file_exists" => match args {
                [path] => Ok(Self::FileExists { path: path.clone() }),
                _ => Err(arity("file_exists", "1")),
            },
            "file_contains" => match args {
                [path, needle] => Ok(Self::FileContains {
                    path: path.clone(),
                    needle: needle.clone(),
                }),
                _ => Err(arity("file_contains", "2")),
            },
            "command_succeeds" => match args {
                [command] => Ok(Self::CommandSucceeds {
                    command: command.clone(),
                }),
                _ => Err(arity("command_succeeds", "1")),
            },
            "no_exceptions" => Ok(Self::NoExceptions),
            "output_contains" => match args {
                [text] => Ok(Self::OutputContains { text: text.clone() }),
                _ => Err(arity("output_contains", "1")),
            },
            "compiles" => Self::parse_compiles(args).map_err(|e| match e {
                CriterionError::Arity { .. } => arity("compiles", "0 to 2"),
                other => other,
            }),
            _ => Err(CriterionError::UnknownKind(criterion.kind().to_string())),
        }
    }

    fn parse_compiles(args: &[String]) -> Result<Self, CriterionError> {
        let (pattern, language) = match args {
            [] => (None, None),
            [pattern] => (Some(pattern.as_str()), None),
            [pattern, language] => (Some(pattern.as_str()), Some(language.as_str())),
            _ => {
                return Err(CriterionError::Arity {
                    kind: "compiles",
                    expected: "0 to 2",
                    got: args.len(),
                })
            }
        };
        let pattern = pattern.filter(|p| !p.trim().is_empty());

        let language = match language {
            Some(name) => {
                Language::parse(name).ok_or_else(|| CriterionError::UnknownLanguage(name.into()))?
            }
            None => pattern
                .and_then(Language::from_pattern)
                .unwrap_or(Language::DEFAULT),
        };
        let pattern = pattern.map_or_else(|| language.default_pattern().to_string(), str::to_string);
        Ok(Self::Compiles { pattern, language })
    }

    /// Aggregation weight for this kind.
    pub fn weight(&self) -> f64 {
        match self {
            Self::FileExists { .. } => WEIGHT_FILE_EXISTS,
            Self::FileContains { .. } => WEIGHT_FILE_CONTAINS,
            Self::CommandSucceeds { .. } => WEIGHT_COMMAND_SUCCEEDS,
            Self::NoExceptions => WEIGHT_NO_EXCEPTIONS,
            Self::OutputContains { .. } => WEIGHT_OUTPUT_CONTAINS,
            Self::Compiles { .. } => WEIGHT_COMPILES,
        }
    }

    /// Human-readable label, e.g. `file_exists(out.txt)`.
    pub fn label(&self) -> String {
        match self {
            Self::FileExists { path } => format!("file_exists({path})"),
            Self::FileContains { path, needle } => format!("file_contains({path}, {needle:?})"),
            Self::CommandSucceeds { command } => format!("command_succeeds({command})"),
            Self::NoExceptions => "no_exceptions()".to_string(),
            Self::OutputContains { text } => format!("output_contains({text:?})"),
            Self::Compiles { pattern, language } => format!("compiles({pattern}, {language})"),
        }
    }
}

/// Judge evaluating one deterministic criterion.
pub struct CriterionJudge {
    kind: CriterionKind,
    label: String,
}

impl CriterionJudge {
    pub fn new(kind: CriterionKind) -> Self {
        let label = kind.label();
        Self { kind, label }
    }

    pub fn kind(&self) -> &CriterionKind {
        &self.kind
    }

    fn file_exists(&self, workspace: &Path, path: &str) -> Judgment {
        match confine(workspace, Path::new(path)) {
            Ok(target) if target.exists() => Judgment::pass(&self.label, format!("found {path}")),
            Ok(_) => Judgment::fail(&self.label, format!("file not found: {path}")),
            Err(e) => Judgment::fail(&self.label, e.to_string()),
        }
    }

    fn file_contains(&self, workspace: &Path, path: &str, needle: &str) -> Judgment {
        let target = match confine(workspace, Path::new(path)) {
            Ok(target) => target,
            Err(e) => return Judgment::fail(&self.label, e.to_string()),
        };
        match std::fs::read_to_string(&target) {
            Ok(content) if content.contains(needle) => {
                Judgment::pass(&self.label, format!("{path} contains {needle:?}"))
            }
            Ok(_) => Judgment::fail(&self.label, format!("{path} does not contain {needle:?}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Judgment::fail(&self.label, format!("file not found: {path}"))
            }
            Err(e) => Judgment::fail(&self.label, format!("could not read {path}: {e}")),
        }
    }

    async fn command_succeeds(&self, workspace: &Path, command: &str, timeout: Duration) -> Judgment {
        match run_shell(command, workspace, timeout, &[]).await {
            Ok(result) if result.timed_out => Judgment::fail(
                &self.label,
                format!("`{command}` timed out after {}ms", result.duration_ms),
            ),
            Ok(result) if result.exit_code == 0 => {
                Judgment::pass(&self.label, format!("`{command}` exited 0"))
            }
            Ok(result) => Judgment::fail(
                &self.label,
                format!(
                    "`{command}` exited {}: {}",
                    result.exit_code,
                    excerpt(&result.output)
                ),
            )
            .with_metadata("exit_code", result.exit_code),
            Err(e) => Judgment::fail(&self.label, format!("`{command}` could not run: {e}")),
        }
    }

    fn no_exceptions(&self, output: &str) -> Judgment {
        match find_exception(output) {
            Some(marker) => Judgment::fail(
                &self.label,
                format!("{} detected: {}", marker.label, marker.line),
            ),
            None => Judgment::pass(&self.label, "no exception markers in output"),
        }
    }

    fn output_contains(&self, output: &str, text: &str) -> Judgment {
        let found = output.to_lowercase().contains(&text.to_lowercase());
        if found {
            Judgment::pass(&self.label, format!("output contains {text:?}"))
        } else {
            Judgment::fail(&self.label, format!("output does not contain {text:?}"))
        }
    }

    async fn compiles(
        &self,
        workspace: &Path,
        pattern: &str,
        language: Language,
        timeout: Duration,
    ) -> Judgment {
        let sources = find_sources(workspace, pattern);
        if sources.is_empty() {
            return Judgment::pass(&self.label, format!("no files match {pattern}; nothing to compile"));
        }

        let out_dir: PathBuf = std::env::temp_dir().join(format!("parity-build-{}", Uuid::new_v4().simple()));
        if let Err(e) = std::fs::create_dir_all(&out_dir) {
            return Judgment::fail(&self.label, format!("could not create build dir: {e}"));
        }
        let command = language.command(&sources, &out_dir);
        let result = run_shell(&command, workspace, timeout, &[]).await;
        if let Err(e) = sandbox_fs::remove_tree(&out_dir) {
            tracing::debug!(error = %e, "failed to remove build dir");
        }

        let judgment = match result {
            Ok(r) if r.timed_out => Judgment::fail(&self.label, "compiler timed out"),
            Ok(r) if r.exit_code == 0 => Judgment::pass(
                &self.label,
                format!("{} {language} file(s) compiled", sources.len()),
            ),
            Ok(r) => Judgment::fail(
                &self.label,
                format!("compiler exited {}: {}", r.exit_code, excerpt(&r.output)),
            ),
            Err(e) => Judgment::fail(&self.label, format!("compiler could not run: {e}")),
        };
        judgment.with_metadata("files", sources.len())
    }
}

#[async_trait]
impl Judge for CriterionJudge {
    fn name(&self) -> &str {
        &self.label
    }

    async fn judge(&self, ctx: &JudgeContext<'_>) -> Judgment {
        let timeout = Duration::from_secs(ctx.use_case.timeout_seconds());
        match &self.kind {
            CriterionKind::FileExists { path } => self.file_exists(ctx.workspace, path),
            CriterionKind::FileContains { path, needle } => {
                self.file_contains(ctx.workspace, path, needle)
            }
            CriterionKind::CommandSucceeds { command } => {
                self.command_succeeds(ctx.workspace, command, timeout).await
            }
            CriterionKind::NoExceptions => self.no_exceptions(ctx.output),
            CriterionKind::OutputContains { text } => self.output_contains(ctx.output, text),
            CriterionKind::Compiles { pattern, language } => {
                self.compiles(ctx.workspace, pattern, *language, timeout).await
            }
        }
    }
}

fn excerpt(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.len() <= OUTPUT_EXCERPT {
        return trimmed.to_string();
    }
    let mut end = OUTPUT_EXCERPT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}

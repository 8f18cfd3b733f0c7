//! Use-case loading from YAML or JSON files.
//!
//! Field names are camelCase; unknown fields are ignored. Every document is
//! validated through [`UseCase::builder`], so a loaded use case upholds the
//! same invariants as one built in code.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::domain::{
    ParityError, QuestionStrategy, Result, Setup, SuccessCriterion, UseCase,
    DEFAULT_MAX_TURNS, DEFAULT_TIMEOUT_SECONDS,
};

/// Turn and timeout limits applied when a document omits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadDefaults {
    pub max_turns: u32,
    pub timeout_seconds: u64,
}

impl Default for LoadDefaults {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// Outcome of loading one file from a directory.
#[derive(Debug)]
pub struct LoadedUseCase {
    pub path: PathBuf,
    pub result: Result<UseCase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UseCaseDocument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    setup: Option<Setup>,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    question_strategy: Option<QuestionStrategy>,
    #[serde(default)]
    expected_behavior: Option<String>,
    #[serde(default)]
    success_criteria: Vec<CriterionDocument>,
    #[serde(default)]
    max_turns: Option<u32>,
    #[serde(default)]
    timeout_seconds: Option<u64>,
    #[serde(default)]
    requires_api: bool,
}

#[derive(Debug, Deserialize)]
struct CriterionDocument {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    args: Vec<Value>,
}

impl CriterionDocument {
    fn into_criterion(self) -> std::result::Result<SuccessCriterion, crate::domain::ConfigError> {
        let args = self.args.into_iter().map(arg_to_string).collect();
        SuccessCriterion::new(self.kind, args)
    }
}

// Scalars are accepted unquoted (`args: [3]`), so stringify them.
fn arg_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl UseCaseDocument {
    fn into_use_case(self, defaults: LoadDefaults) -> Result<UseCase> {
        let mut builder = UseCase::builder(self.name, self.prompt)
            .max_turns(self.max_turns.unwrap_or(defaults.max_turns))
            .timeout_seconds(self.timeout_seconds.unwrap_or(defaults.timeout_seconds))
            .requires_api(self.requires_api);

        if let Some(category) = self.category {
            builder = builder.category(category);
        }
        if let Some(difficulty) = self.difficulty {
            builder = builder.difficulty(difficulty);
        }
        if let Some(setup) = self.setup {
            builder = builder.setup(setup);
        }
        if let Some(strategy) = self.question_strategy {
            builder = builder.question_strategy(strategy);
        }
        if let Some(expected) = self.expected_behavior {
            builder = builder.expected_behavior(expected);
        }
        for criterion in self.success_criteria {
            builder = builder.criterion(criterion.into_criterion()?);
        }
        Ok(builder.build()?)
    }
}

fn is_use_case_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("yaml" | "yml" | "json")
    )
}

/// Parse a use-case document. The format is chosen by extension: `.json`
/// is JSON, anything else YAML.
pub fn parse_str(content: &str, path: &Path, defaults: LoadDefaults) -> Result<UseCase> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let document: UseCaseDocument = if is_json {
        serde_json::from_str(content)?
    } else {
        serde_yaml::from_str(content)?
    };
    document.into_use_case(defaults)
}

/// Load one use-case file. Any failure is reported as
/// [`ParityError::Load`] naming the file.
pub fn load_file(path: &Path, defaults: LoadDefaults) -> Result<UseCase> {
    let content = std::fs::read_to_string(path).map_err(|e| load_error(path, &e))?;
    parse_str(&content, path, defaults).map_err(|e| match e {
        ParityError::Load { .. } => e,
        other => load_error(path, &other),
    })
}

fn load_error(path: &Path, err: &dyn std::fmt::Display) -> ParityError {
    ParityError::Load {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Load every `.yaml`, `.yml` and `.json` file under `dir`, recursively,
/// sorted by path. A file that fails to load is returned with its error;
/// it does not stop the others.
pub fn load_dir(dir: &Path, defaults: LoadDefaults) -> Result<Vec<LoadedUseCase>> {
    if !dir.is_dir() {
        return Err(load_error(dir, &"not a directory"));
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_use_case_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    paths.sort();
    debug!(dir = %dir.display(), files = paths.len(), "loading use cases");

    Ok(paths
        .into_iter()
        .map(|path| {
            let result = load_file(&path, defaults);
            LoadedUseCase { path, result }
        })
        .collect())
}

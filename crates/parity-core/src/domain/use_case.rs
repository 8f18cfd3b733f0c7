//! Use case definitions: the declarative task an agent is asked to perform.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Default turn budget for a use case.
pub const DEFAULT_MAX_TURNS: u32 = 10;

/// Default wall-clock budget for a use case, in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// A file materialized into the workspace before the agent runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetupFile {
    /// Path relative to the workspace root.
    pub path: String,
    pub content: String,
}

impl SetupFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Workspace preparation for a use case.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Setup {
    /// Fixed workspace path template. `None` means a temporary workspace.
    ///
    /// `{{timestamp}}` is replaced with the setup time (`%Y%m%d-%H%M%S`).
    pub workspace: Option<String>,
    pub files: Vec<SetupFile>,
}

/// How an interactive agent should answer clarifying questions.
///
/// Carried as data only; the engine does not interpret it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionStrategy {
    pub default_strategy: String,
    pub overrides: BTreeMap<String, String>,
}

impl Default for QuestionStrategy {
    fn default() -> Self {
        Self {
            default_strategy: "default".to_string(),
            overrides: BTreeMap::new(),
        }
    }
}

/// A typed predicate descriptor: criterion kind plus kind-specific arguments.
///
/// Unknown kinds are tolerated here and only rejected when a jury is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "CriterionFields")]
pub struct SuccessCriterion {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Deserialize)]
struct CriterionFields {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    args: Vec<String>,
}

impl TryFrom<CriterionFields> for SuccessCriterion {
    type Error = ConfigError;

    fn try_from(fields: CriterionFields) -> Result<Self, Self::Error> {
        Self::new(fields.kind, fields.args)
    }
}

impl SuccessCriterion {
    /// Create a criterion, rejecting a blank kind.
    pub fn new(kind: impl Into<String>, args: Vec<String>) -> Result<Self, ConfigError> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(ConfigError::MissingField("successCriteria.type"));
        }
        Ok(Self {
            kind: kind.trim().to_string(),
            args,
        })
    }

    fn known(kind: &str, args: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    pub fn file_exists(path: &str) -> Self {
        Self::known("file_exists", &[path])
    }

    pub fn file_contains(path: &str, needle: &str) -> Self {
        Self::known("file_contains", &[path, needle])
    }

    pub fn command_succeeds(command: &str) -> Self {
        Self::known("command_succeeds", &[command])
    }

    pub fn no_exceptions() -> Self {
        Self::known("no_exceptions", &[])
    }

    pub fn output_contains(text: &str) -> Self {
        Self::known("output_contains", &[text])
    }

    /// `pattern` of `None` compiles every source file of the default language.
    pub fn compiles(pattern: Option<&str>) -> Self {
        match pattern {
            Some(p) => Self::known("compiles", &[p]),
            None => Self::known("compiles", &[]),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// An immutable, validated use case.
///
/// `name` and `prompt` are guaranteed non-blank; construction goes through
/// [`UseCaseBuilder`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UseCase {
    name: String,
    category: String,
    difficulty: String,
    setup: Setup,
    prompt: String,
    question_strategy: QuestionStrategy,
    expected_behavior: Option<String>,
    success_criteria: Vec<SuccessCriterion>,
    max_turns: u32,
    timeout_seconds: u64,
    requires_api: bool,
}

impl UseCase {
    pub fn builder(name: impl Into<String>, prompt: impl Into<String>) -> UseCaseBuilder {
        UseCaseBuilder::new(name, prompt)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn difficulty(&self) -> &str {
        &self.difficulty
    }

    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn question_strategy(&self) -> &QuestionStrategy {
        &self.question_strategy
    }

    /// Free-text description of what a good run looks like, if declared.
    pub fn expected_behavior(&self) -> Option<&str> {
        self.expected_behavior.as_deref()
    }

    pub fn success_criteria(&self) -> &[SuccessCriterion] {
        &self.success_criteria
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn requires_api(&self) -> bool {
        self.requires_api
    }
}

/// Fluent builder for [`UseCase`]; all validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct UseCaseBuilder {
    name: String,
    category: String,
    difficulty: String,
    setup: Setup,
    prompt: String,
    question_strategy: QuestionStrategy,
    expected_behavior: Option<String>,
    success_criteria: Vec<SuccessCriterion>,
    max_turns: u32,
    timeout_seconds: u64,
    requires_api: bool,
}

impl UseCaseBuilder {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: "general".to_string(),
            difficulty: "medium".to_string(),
            setup: Setup::default(),
            prompt: prompt.into(),
            question_strategy: QuestionStrategy::default(),
            expected_behavior: None,
            success_criteria: Vec::new(),
            max_turns: DEFAULT_MAX_TURNS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            requires_api: false,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = difficulty.into();
        self
    }

    /// Use a fixed workspace path template instead of a temporary directory.
    pub fn workspace(mut self, template: impl Into<String>) -> Self {
        self.setup.workspace = Some(template.into());
        self
    }

    pub fn setup_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.setup.files.push(SetupFile::new(path, content));
        self
    }

    pub fn setup(mut self, setup: Setup) -> Self {
        self.setup = setup;
        self
    }

    pub fn question_strategy(mut self, strategy: QuestionStrategy) -> Self {
        self.question_strategy = strategy;
        self
    }

    pub fn expected_behavior(mut self, text: impl Into<String>) -> Self {
        self.expected_behavior = Some(text.into());
        self
    }

    pub fn criterion(mut self, criterion: SuccessCriterion) -> Self {
        self.success_criteria.push(criterion);
        self
    }

    pub fn criteria(mut self, criteria: impl IntoIterator<Item = SuccessCriterion>) -> Self {
        self.success_criteria.extend(criteria);
        self
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn requires_api(mut self, requires_api: bool) -> Self {
        self.requires_api = requires_api;
        self
    }

    /// Validate and freeze the use case.
    pub fn build(self) -> Result<UseCase, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField("name"));
        }
        if self.prompt.trim().is_empty() {
            return Err(ConfigError::MissingField("prompt"));
        }
        if self.max_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxTurns",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeoutSeconds",
                reason: "must be greater than 0".to_string(),
            });
        }
        let expected_behavior = self
            .expected_behavior
            .filter(|text| !text.trim().is_empty());

        Ok(UseCase {
            name: self.name.trim().to_string(),
            category: self.category,
            difficulty: self.difficulty,
            setup: self.setup,
            prompt: self.prompt,
            question_strategy: self.question_strategy,
            expected_behavior,
            success_criteria: self.success_criteria,
            max_turns: self.max_turns,
            timeout_seconds: self.timeout_seconds,
            requires_api: self.requires_api,
        })
    }
}

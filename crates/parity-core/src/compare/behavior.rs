//! Behavioral pattern analysis: which phase each tool call belongs to, and
//! how closely two phase sequences line up.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{ExecutionSummary, ToolCallEvent};

/// Number of trailing calls inspected by [`ends_with_verification`].
pub const VERIFICATION_WINDOW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Exploration,
    Modification,
    Verification,
    Planning,
    Unknown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exploration => "EXPLORATION",
            Self::Modification => "MODIFICATION",
            Self::Verification => "VERIFICATION",
            Self::Planning => "PLANNING",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const SHELL_TOOLS: &[&str] = &[
    "bash",
    "shell",
    "sh",
    "exec",
    "execute",
    "execute_command",
    "run_command",
    "run_shell_command",
    "terminal",
    "command",
];

/// Whole words of a tool name that mark it as planning.
const PLANNING_WORDS: &[&str] = &[
    "plan", "plans", "planning", "planner", "todo", "todos", "think", "thinking", "outline",
];
const VERIFICATION_KEYWORDS: &[&str] = &["test", "compile", "build", "lint", "verify", "check"];
const MODIFICATION_KEYWORDS: &[&str] = &[
    "write", "edit", "create", "patch", "replace", "insert", "delete", "remove", "rename", "move",
    "apply",
];
const EXPLORATION_KEYWORDS: &[&str] = &[
    "read", "view", "cat", "grep", "glob", "search", "find", "list", "ls", "fetch", "open", "tree",
];

fn build_or_test_command() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)(^|[\s;&|(])(
                javac | java\s | gcc | g\+\+ | clang | cc\s | c\+\+ | make\b | cmake | mvn | gradle
              | cargo\s+(build|test|check|run|clippy)
              | rustc | go\s+(build|test|vet|run)
              | pytest | python3?\s+-m\s+(pytest|unittest|py_compile)
              | npm\s+(test|run\s+build) | yarn\s+(test|build) | npx\s+(jest|tsc) | tsc | jest
              | node\s+--check | dotnet\s+(build|test)
            )",
        )
        .ok()
    })
    .as_ref()
}

fn listing_command() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(ls|cat|head|tail|find|grep|rg|tree|pwd|wc|less|more|file|stat|du)\b").ok()
    })
    .as_ref()
}

fn mutating_command() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(^\s*(mkdir|touch|rm|mv|cp|tee|patch|sed\s+-i|git\s+apply)\b)|(>>?\s*\S)").ok()
    })
    .as_ref()
}

fn is_match(re: Option<&Regex>, text: &str) -> bool {
    re.is_some_and(|re| re.is_match(text))
}

fn contains_any(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| name.contains(k))
}

/// Split a tool name into lowercase words at `_`, `-`, `.`, spaces and
/// camel-case humps: `TodoWrite` is `todo` + `write`.
fn name_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn is_planning_name(name: &str) -> bool {
    name_words(name)
        .iter()
        .any(|w| PLANNING_WORDS.contains(&w.as_str()))
}

/// `index * 3 >= total * 2`: for 4 calls only index 3 qualifies, for 6
/// calls indices 4 and 5.
fn in_last_third(index: usize, total: usize) -> bool {
    index.saturating_mul(3) >= total.saturating_mul(2)
}

fn classify_command(command: &str, index: usize, total: usize) -> Phase {
    if is_match(build_or_test_command(), command) {
        if in_last_third(index, total) {
            Phase::Verification
        } else {
            Phase::Exploration
        }
    } else if is_match(listing_command(), command) {
        Phase::Exploration
    } else if is_match(mutating_command(), command) {
        Phase::Modification
    } else {
        Phase::Unknown
    }
}

/// Phase of the call at `index` in a sequence of `total` calls.
///
/// Shell-style tools are classified by their command text. A build or test
/// command only counts as verification in the last third of the session;
/// earlier it is treated as exploration.
pub fn classify(call: &ToolCallEvent, index: usize, total: usize) -> Phase {
    let name = call.tool_name.trim().to_lowercase();

    if SHELL_TOOLS.contains(&name.as_str()) {
        return call
            .command_text()
            .map_or(Phase::Unknown, |cmd| classify_command(cmd, index, total));
    }
    if is_planning_name(&call.tool_name) {
        Phase::Planning
    } else if contains_any(&name, VERIFICATION_KEYWORDS) {
        Phase::Verification
    } else if contains_any(&name, MODIFICATION_KEYWORDS) {
        Phase::Modification
    } else if contains_any(&name, EXPLORATION_KEYWORDS) {
        Phase::Exploration
    } else {
        Phase::Unknown
    }
}

/// Phase of every call, in order.
pub fn phases(calls: &[ToolCallEvent]) -> Vec<Phase> {
    let total = calls.len();
    calls
        .iter()
        .enumerate()
        .map(|(i, call)| classify(call, i, total))
        .collect()
}

/// Positional agreement of two phase sequences.
///
/// Equal phases at the same index are counted over the common prefix and
/// divided by the longer length, so trailing extra calls always dilute the
/// score. Two empty sequences are identical.
pub fn phase_similarity(a: &[Phase], b: &[Phase]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let matches = a.iter().zip(b).filter(|(x, y)| x == y).count();
    matches as f64 / longest as f64
}

/// Whether one of the last [`VERIFICATION_WINDOW`] calls is verification.
pub fn ends_with_verification(phases: &[Phase]) -> bool {
    phases
        .iter()
        .rev()
        .take(VERIFICATION_WINDOW)
        .any(|p| *p == Phase::Verification)
}

/// Whether the first call's name is planning-oriented.
pub fn plans_first(calls: &[ToolCallEvent]) -> bool {
    calls
        .first()
        .is_some_and(|c| is_planning_name(&c.tool_name))
}

fn phase_counts(phases: &[Phase]) -> BTreeMap<Phase, usize> {
    let mut counts = BTreeMap::new();
    for phase in phases {
        *counts.entry(*phase).or_insert(0) += 1;
    }
    counts
}

/// Phase profile of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProfile {
    pub phases: Vec<Phase>,
    pub counts: BTreeMap<Phase, usize>,
    pub ends_with_verification: bool,
    pub plans_first: bool,
}

impl PhaseProfile {
    pub fn from_calls(calls: &[ToolCallEvent]) -> Self {
        let phases = phases(calls);
        Self {
            counts: phase_counts(&phases),
            ends_with_verification: ends_with_verification(&phases),
            plans_first: plans_first(calls),
            phases,
        }
    }
}

/// Side-by-side phase profiles of a subject and a reference run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralAnalysis {
    pub subject: PhaseProfile,
    pub reference: PhaseProfile,
    pub similarity: f64,
}

impl BehavioralAnalysis {
    pub fn analyze(subject: &ExecutionSummary, reference: &ExecutionSummary) -> Self {
        let subject = PhaseProfile::from_calls(&subject.tool_calls);
        let reference = PhaseProfile::from_calls(&reference.tool_calls);
        let similarity = phase_similarity(&subject.phases, &reference.phases);
        Self {
            subject,
            reference,
            similarity,
        }
    }

    /// Descriptions of habits the reference has and the subject lacks.
    pub fn divergences(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.reference.ends_with_verification && !self.subject.ends_with_verification {
            out.push("reference verifies at the end, subject does not".to_string());
        }
        if self.reference.plans_first && !self.subject.plans_first {
            out.push("reference plans first, subject does not".to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bash(cmd: &str) -> ToolCallEvent {
        ToolCallEvent::new("bash").with_input("command", cmd)
    }

    #[test]
    fn test_classify_by_name() {
        assert_eq!(classify(&ToolCallEvent::new("read_file"), 0, 1), Phase::Exploration);
        assert_eq!(classify(&ToolCallEvent::new("edit_file"), 0, 1), Phase::Modification);
        assert_eq!(classify(&ToolCallEvent::new("TodoWrite"), 0, 1), Phase::Planning);
        assert_eq!(classify(&ToolCallEvent::new("run_tests"), 0, 1), Phase::Verification);
        assert_eq!(classify(&ToolCallEvent::new("mystery"), 0, 1), Phase::Unknown);
    }

    #[test]
    fn test_build_command_position_matters() {
        let call = bash("javac Main.java");
        assert_eq!(classify(&call, 0, 6), Phase::Exploration);
        assert_eq!(classify(&call, 5, 6), Phase::Verification);
        assert_eq!(classify(&call, 4, 6), Phase::Verification);
        assert_eq!(classify(&call, 3, 6), Phase::Exploration);
    }

    #[test]
    fn test_last_third_boundary() {
        assert!(!in_last_third(2, 4));
        assert!(in_last_third(3, 4));
        assert!(in_last_third(2, 3));
        assert!(!in_last_third(1, 3));
        assert!(!in_last_third(0, 1));
        assert!(!in_last_third(0, 2));

        let call = bash("cargo test");
        assert_eq!(classify(&call, 2, 4), Phase::Exploration);
        assert_eq!(classify(&call, 3, 4), Phase::Verification);
    }

    #[test]
    fn test_planning_matches_whole_words_only() {
        for name in ["plan", "create_plan", "TodoWrite", "todo_write", "think", "update-plan", "sequential_thinking"] {
            assert_eq!(classify(&ToolCallEvent::new(name), 0, 1), Phase::Planning, "{name}");
        }
        assert_ne!(classify(&ToolCallEvent::new("explanation"), 0, 1), Phase::Planning);
        assert_eq!(classify(&ToolCallEvent::new("planet_lookup"), 0, 1), Phase::Unknown);
        assert!(!plans_first(&[ToolCallEvent::new("explanation")]));
    }

    #[test]
    fn test_name_words_splits_humps_and_separators() {
        assert_eq!(name_words("TodoWrite"), vec!["todo", "write"]);
        assert_eq!(name_words("read_file"), vec!["read", "file"]);
        assert_eq!(name_words("mcp.create-plan"), vec!["mcp", "create", "plan"]);
        assert!(name_words("__").is_empty());
    }

    #[test]
    fn test_shell_listing_and_mutation() {
        assert_eq!(classify(&bash("ls -la"), 2, 3), Phase::Exploration);
        assert_eq!(classify(&bash("echo hi > out.txt"), 0, 3), Phase::Modification);
        assert_eq!(classify(&ToolCallEvent::new("bash"), 0, 1), Phase::Unknown);
    }

    #[test]
    fn test_phase_similarity() {
        use Phase::*;
        assert_eq!(phase_similarity(&[], &[]), 1.0);
        assert_eq!(phase_similarity(&[Exploration, Modification], &[Exploration, Modification]), 1.0);
        assert_eq!(phase_similarity(&[Exploration], &[Exploration, Modification, Verification]), 1.0 / 3.0);
        assert_eq!(phase_similarity(&[Exploration], &[]), 0.0);
    }

    #[test]
    fn test_ends_with_verification_window() {
        use Phase::*;
        assert!(ends_with_verification(&[Exploration, Verification, Modification]));
        assert!(!ends_with_verification(&[Verification, Modification, Modification]));
        assert!(!ends_with_verification(&[]));
    }

    #[test]
    fn test_plans_first_checks_first_call_only() {
        let calls = vec![ToolCallEvent::new("read_file"), ToolCallEvent::new("plan")];
        assert!(!plans_first(&calls));
        assert!(plans_first(&[ToolCallEvent::new("create_plan")]));
    }
}

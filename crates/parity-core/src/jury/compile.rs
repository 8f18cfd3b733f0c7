//! Source discovery and batch compiler invocation for the `compiles` criterion.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Directories never searched for sources.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules", "build", "out", "__pycache__"];

/// A language with a batch compiler or syntax checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Java,
    Python,
    C,
    Cpp,
    Rust,
    TypeScript,
    JavaScript,
}

impl Language {
    /// Language compiled when a use case does not name one.
    pub const DEFAULT: Language = Language::Java;

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "java" => Some(Self::Java),
            "python" | "py" => Some(Self::Python),
            "c" => Some(Self::C),
            "cpp" | "c++" | "cxx" => Some(Self::Cpp),
            "rust" | "rs" => Some(Self::Rust),
            "typescript" | "ts" => Some(Self::TypeScript),
            "javascript" | "js" | "node" => Some(Self::JavaScript),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "java" => Some(Self::Java),
            "py" => Some(Self::Python),
            "c" => Some(Self::C),
            "cc" | "cpp" | "cxx" => Some(Self::Cpp),
            "rs" => Some(Self::Rust),
            "ts" => Some(Self::TypeScript),
            "js" | "mjs" => Some(Self::JavaScript),
            _ => None,
        }
    }

    /// Infer the language from a glob pattern's trailing extension.
    pub fn from_pattern(pattern: &str) -> Option<Self> {
        let ext = pattern.rsplit_once('.').map(|(_, ext)| ext)?;
        if ext.contains(['*', '?', '/']) {
            return None;
        }
        Self::from_extension(ext)
    }

    pub fn default_pattern(&self) -> &'static str {
        match self {
            Self::Java => "**/*.java",
            Self::Python => "**/*.py",
            Self::C => "**/*.c",
            Self::Cpp => "**/*.cpp",
            Self::Rust => "**/*.rs",
            Self::TypeScript => "**/*.ts",
            Self::JavaScript => "**/*.js",
        }
    }

    /// Shell command compiling `files` (workspace-relative), writing any
    /// artifacts into `out_dir`.
    pub fn command(&self, files: &[PathBuf], out_dir: &Path) -> String {
        let quoted: Vec<String> = files.iter().map(|f| shell_quote(&f.to_string_lossy())).collect();
        let list = quoted.join(" ");
        let out = shell_quote(&out_dir.to_string_lossy());
        match self {
            Self::Java => format!("javac -d {out} {list}"),
            Self::Python => format!("python3 -m py_compile {list}"),
            Self::C => format!("cc -fsyntax-only {list}"),
            Self::Cpp => format!("c++ -fsyntax-only {list}"),
            Self::TypeScript => format!("tsc --noEmit {list}"),
            Self::Rust => quoted
                .iter()
                .map(|f| {
                    format!("rustc --edition 2021 --crate-type lib --emit=metadata --out-dir {out} {f}")
                })
                .collect::<Vec<_>>()
                .join(" && "),
            Self::JavaScript => quoted
                .iter()
                .map(|f| format!("node --check {f}"))
                .collect::<Vec<_>>()
                .join(" && "),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Java => "java",
            Self::Python => "python",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Rust => "rust",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
        };
        f.write_str(name)
    }
}

fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Translate a glob into an anchored regex over `/`-separated relative paths.
///
/// Supports `*`, `?`, `**` and `**/`. A pattern without `/` matches file
/// names at any depth.
pub fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let pattern = if pattern.contains('/') {
        pattern.trim_start_matches("./").to_string()
    } else {
        format!("**/{pattern}")
    };

    let mut re = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    re.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');
    Regex::new(&re).ok()
}

/// Workspace-relative files under `root` matching `pattern`, sorted.
pub fn find_sources(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let Some(matcher) = glob_to_regex(pattern) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0 || !(e.file_type().is_dir() && SKIPPED_DIRS.iter().any(|d| *d == name))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .filter(|rel| {
            let normalized = rel.to_string_lossy().replace('\\', "/");
            matcher.is_match(&normalized)
        })
        .collect();
    found.sort();
    found
}

//! Harness configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{ConfigError, DEFAULT_MAX_TURNS, DEFAULT_TIMEOUT_SECONDS};
use crate::loader::LoadDefaults;

/// Options for a [`TestHarness`](super::TestHarness).
///
/// `max_turns` and `timeout_seconds` are the limits given to use cases
/// loaded from files that do not declare their own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    pub max_turns: u32,
    pub timeout_seconds: u64,
    /// Write each run's raw output to `transcript_dir`.
    pub save_transcripts: bool,
    /// Close workspaces after each run. When disabled, temporary
    /// workspaces are left on disk for inspection.
    pub cleanup_workspaces: bool,
    pub transcript_dir: PathBuf,
    /// Launch command handed to the agent executor.
    pub agent_command: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            save_transcripts: true,
            cleanup_workspaces: true,
            transcript_dir: PathBuf::from("transcripts"),
            agent_command: String::new(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_turns",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_seconds",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.save_transcripts && self.transcript_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("transcript_dir"));
        }
        Ok(())
    }

    pub fn load_defaults(&self) -> LoadDefaults {
        LoadDefaults {
            max_turns: self.max_turns,
            timeout_seconds: self.timeout_seconds,
        }
    }
}

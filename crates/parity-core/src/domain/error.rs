//! Domain-level error taxonomy for the parity harness.

use std::path::PathBuf;

use crate::sandbox::SandboxError;

/// Errors produced while validating configuration objects.
///
/// These are the only failures that are fatal: they surface at build time,
/// before any use case runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("harness requires an agent executor")]
    MissingExecutor,
}

/// Parity domain errors.
#[derive(Debug, thiserror::Error)]
pub enum ParityError {
    #[error("invalid use case: {0}")]
    InvalidUseCase(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("failed to load {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for parity domain operations.
pub type Result<T> = std::result::Result<T, ParityError>;

//! Sandbox: a filesystem workspace plus timeout-bounded command execution.
//!
//! There is no process isolation beyond the working directory. A sandbox
//! either owns a temporary directory (deleted on close) or adopts a fixed
//! path (never deleted).
//!
//! # Modules
//!
//! - [`local`]   — `LocalSandbox`, the temp-or-fixed directory implementation
//! - [`process`] — `run_shell()` with hard timeout and partial output capture
//! - [`fs`]      — tree copy and bottom-up tree removal
//! - [`error`]   — `SandboxError` / `SandboxResult`

pub mod error;
pub mod fs;
pub mod local;
pub mod process;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ExecutionResult;

pub use error::{SandboxError, SandboxResult};
pub use local::{LocalSandbox, SandboxMode};
pub use process::run_shell;

/// Contract for an isolated workspace with command execution.
///
/// Remote paths are relative to the workspace root; anything resolving
/// outside it is rejected with [`SandboxError::PathEscape`].
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Create (or adopt) the workspace directory.
    async fn start(&mut self) -> SandboxResult<()>;

    /// Run `command` through the shell, rooted at the workspace or at
    /// `working_dir` beneath it.
    ///
    /// Fails with [`SandboxError::NotStarted`] if `start` was not called.
    async fn exec(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> SandboxResult<ExecutionResult>;

    async fn upload_file(&self, local: &Path, remote: &Path) -> SandboxResult<()>;

    async fn download_file(&self, remote: &Path, local: &Path) -> SandboxResult<()>;

    async fn upload_directory(&self, local: &Path, remote: &Path) -> SandboxResult<()>;

    async fn download_directory(&self, remote: &Path, local: &Path) -> SandboxResult<()>;

    /// Workspace root, once started.
    fn workspace(&self) -> Option<&Path>;

    fn is_running(&self) -> bool;

    /// Stop the sandbox. Deletes the workspace only when it is a temporary
    /// directory owned by this sandbox. Closing twice is a no-op.
    async fn close(&mut self) -> SandboxResult<()>;
}

/// Resolve `relative` beneath `root`, rejecting absolute paths and `..`.
pub fn confine(root: &Path, relative: &Path) -> SandboxResult<PathBuf> {
    use std::path::Component;

    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(SandboxError::PathEscape(relative.to_path_buf()));
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confine_relative() {
        let root = Path::new("/ws");
        assert_eq!(
            confine(root, Path::new("src/./main.rs")).unwrap(),
            PathBuf::from("/ws/src/main.rs")
        );
        assert_eq!(confine(root, Path::new("")).unwrap(), PathBuf::from("/ws"));
    }

    #[test]
    fn test_confine_rejects_escape() {
        let root = Path::new("/ws");
        assert!(matches!(
            confine(root, Path::new("../etc/passwd")),
            Err(SandboxError::PathEscape(_))
        ));
        assert!(matches!(
            confine(root, Path::new("/etc/passwd")),
            Err(SandboxError::PathEscape(_))
        ));
    }
}

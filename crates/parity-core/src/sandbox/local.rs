//! Local directory sandbox: a temporary or fixed workspace on the host.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{SandboxError, SandboxResult};
use super::{confine, fs, process, Sandbox};
use crate::domain::ExecutionResult;

/// Where a [`LocalSandbox`] keeps its workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxMode {
    /// Fresh directory under the system temp dir, deleted on close.
    Temporary,
    /// Caller-chosen directory, created if missing and never deleted.
    Fixed(PathBuf),
}

/// Sandbox backed by a plain host directory.
#[derive(Debug)]
pub struct LocalSandbox {
    mode: SandboxMode,
    root: Option<PathBuf>,
    running: bool,
    closed: bool,
    env: Vec<(String, String)>,
}

impl LocalSandbox {
    pub fn new(mode: SandboxMode) -> Self {
        Self {
            mode,
            root: None,
            running: false,
            closed: false,
            env: Vec::new(),
        }
    }

    pub fn temporary() -> Self {
        Self::new(SandboxMode::Temporary)
    }

    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self::new(SandboxMode::Fixed(path.into()))
    }

    /// Set an environment variable for every command run in this sandbox.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn mode(&self) -> &SandboxMode {
        &self.mode
    }

    /// Whether closing this sandbox deletes its workspace.
    pub fn owns_workspace(&self) -> bool {
        self.mode == SandboxMode::Temporary
    }

    fn running_root(&self) -> SandboxResult<&Path> {
        match (&self.root, self.running) {
            (Some(root), true) => Ok(root.as_path()),
            _ => Err(SandboxError::NotStarted),
        }
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn start(&mut self) -> SandboxResult<()> {
        if self.running {
            return Ok(());
        }
        let root = match &self.mode {
            SandboxMode::Temporary => {
                std::env::temp_dir().join(format!("parity-{}", Uuid::new_v4().simple()))
            }
            SandboxMode::Fixed(path) => path.clone(),
        };
        std::fs::create_dir_all(&root).map_err(|e| SandboxError::io(&root, e))?;
        info!(workspace = %root.display(), temporary = self.owns_workspace(), "sandbox started");

        self.root = Some(root);
        self.running = true;
        self.closed = false;
        Ok(())
    }

    async fn exec(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> SandboxResult<ExecutionResult> {
        let root = self.running_root()?;
        let cwd = match working_dir {
            Some(dir) => confine(root, dir)?,
            None => root.to_path_buf(),
        };
        process::run_shell(command, &cwd, timeout, &self.env).await
    }

    async fn upload_file(&self, local: &Path, remote: &Path) -> SandboxResult<()> {
        let target = confine(self.running_root()?, remote)?;
        fs::copy_file(local, &target)
    }

    async fn download_file(&self, remote: &Path, local: &Path) -> SandboxResult<()> {
        let source = confine(self.running_root()?, remote)?;
        fs::copy_file(&source, local)
    }

    async fn upload_directory(&self, local: &Path, remote: &Path) -> SandboxResult<()> {
        let target = confine(self.running_root()?, remote)?;
        let copied = fs::copy_tree(local, &target)?;
        debug!(files = copied, target = %target.display(), "uploaded directory");
        Ok(())
    }

    async fn download_directory(&self, remote: &Path, local: &Path) -> SandboxResult<()> {
        let source = confine(self.running_root()?, remote)?;
        let copied = fs::copy_tree(&source, local)?;
        debug!(files = copied, source = %source.display(), "downloaded directory");
        Ok(())
    }

    fn workspace(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn close(&mut self) -> SandboxResult<()> {
        if self.closed {
            return Ok(());
        }
        self.running = false;
        self.closed = true;

        if let (SandboxMode::Temporary, Some(root)) = (&self.mode, &self.root) {
            fs::remove_tree(root)?;
            info!(workspace = %root.display(), "temporary workspace deleted");
        }
        Ok(())
    }
}

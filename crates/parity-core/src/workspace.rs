//! Workspace provisioning: build a sandbox for a use case, materialize its
//! setup files, and tear it down exactly once.
//!
//! Whether a workspace is temporary or fixed is decided by the use case: a
//! declared `setup.workspace` path yields a fixed workspace that survives the
//! run for inspection, otherwise a temporary one is created and deleted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::domain::{Result, UseCase};
use crate::obs;
use crate::sandbox::{confine, LocalSandbox, Sandbox, SandboxError};

/// Placeholder substituted in workspace path templates.
pub const TIMESTAMP_PLACEHOLDER: &str = "{{timestamp}}";

/// Sortable, second-precision timestamp format used for the placeholder.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Substitute every `{{timestamp}}` in `template` with `now`.
pub fn expand_workspace_template(template: &str, now: DateTime<Local>) -> String {
    if !template.contains(TIMESTAMP_PLACEHOLDER) {
        return template.to_string();
    }
    let stamp = now.format(TIMESTAMP_FORMAT).to_string();
    template.replace(TIMESTAMP_PLACEHOLDER, &stamp)
}

/// A materialized execution environment for one run.
///
/// Owns its sandbox exclusively; two contexts must never share a fixed path.
pub struct WorkspaceContext {
    sandbox: Box<dyn Sandbox>,
    created_paths: Vec<PathBuf>,
    use_case: Arc<UseCase>,
    temporary: bool,
    closed: bool,
}

impl WorkspaceContext {
    pub fn new(sandbox: Box<dyn Sandbox>, use_case: Arc<UseCase>, temporary: bool) -> Self {
        Self {
            sandbox,
            created_paths: Vec::new(),
            use_case,
            temporary,
            closed: false,
        }
    }

    pub fn sandbox(&self) -> &dyn Sandbox {
        self.sandbox.as_ref()
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.sandbox.workspace()
    }

    /// Paths written during setup, in write order.
    pub fn created_paths(&self) -> &[PathBuf] {
        &self.created_paths
    }

    pub fn use_case(&self) -> &Arc<UseCase> {
        &self.use_case
    }

    /// `true` for temporary workspaces (deleted on cleanup).
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl std::fmt::Debug for WorkspaceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceContext")
            .field("workspace", &self.workspace())
            .field("use_case", &self.use_case.name())
            .field("created_paths", &self.created_paths)
            .field("temporary", &self.temporary)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Builds and tears down workspaces for use cases.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceManager {
    scope: Option<String>,
}

impl WorkspaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place fixed workspaces under `<expanded path>/<scope>`.
    ///
    /// Two managers with different scopes never resolve a use case to the
    /// same fixed directory.
    pub fn scoped(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
        }
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Fixed workspace path for `template` at `now`, including the scope.
    pub fn fixed_path(&self, template: &str, now: DateTime<Local>) -> PathBuf {
        let base = PathBuf::from(expand_workspace_template(template, now));
        match &self.scope {
            Some(scope) => base.join(scope),
            None => base,
        }
    }

    /// Provision a [`LocalSandbox`] for `use_case` and write its setup files.
    pub async fn setup(&self, use_case: Arc<UseCase>) -> Result<WorkspaceContext> {
        let (sandbox, temporary) = match &use_case.setup().workspace {
            Some(template) => {
                let path = self.fixed_path(template, Local::now());
                (LocalSandbox::fixed(path), false)
            }
            None => (LocalSandbox::temporary(), true),
        };
        self.setup_in(use_case, Box::new(sandbox), temporary).await
    }

    /// Start `sandbox` and materialize the use case's setup files in it.
    ///
    /// If writing a file fails, the partially built workspace is cleaned up
    /// before the error is returned.
    pub async fn setup_in(
        &self,
        use_case: Arc<UseCase>,
        mut sandbox: Box<dyn Sandbox>,
        temporary: bool,
    ) -> Result<WorkspaceContext> {
        sandbox.start().await?;
        let mut ctx = WorkspaceContext::new(sandbox, use_case, temporary);

        if let Err(e) = materialize(&mut ctx) {
            self.cleanup(Some(&mut ctx)).await;
            return Err(e);
        }
        debug!(
            use_case = %ctx.use_case.name(),
            files = ctx.created_paths.len(),
            "workspace ready"
        );
        Ok(ctx)
    }

    /// Close the context's sandbox. A `None` context or an already closed
    /// one is a no-op; close failures are logged, not returned.
    pub async fn cleanup(&self, ctx: Option<&mut WorkspaceContext>) {
        let Some(ctx) = ctx else {
            return;
        };
        if ctx.closed {
            return;
        }
        ctx.closed = true;
        if let Err(e) = ctx.sandbox.close().await {
            obs::emit_teardown_error(ctx.use_case.name(), &e);
        }
    }
}

fn materialize(ctx: &mut WorkspaceContext) -> Result<()> {
    let root = ctx
        .workspace()
        .map(Path::to_path_buf)
        .ok_or(SandboxError::NotStarted)?;

    for file in &ctx.use_case.setup().files {
        let target = confine(&root, Path::new(&file.path))?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &file.content).map_err(|e| {
            warn!(path = %target.display(), error = %e, "failed to write setup file");
            e
        })?;
        ctx.created_paths.push(target);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expand_timestamp_placeholder() {
        let now = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            expand_workspace_template("/tmp/run-{{timestamp}}/ws", now),
            "/tmp/run-20260304-050607/ws"
        );
        assert_eq!(expand_workspace_template("/tmp/plain", now), "/tmp/plain");
    }

    #[test]
    fn test_scoped_fixed_paths_differ() {
        let now = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let template = "/tmp/ws-{{timestamp}}";
        let subject = WorkspaceManager::scoped("subject").fixed_path(template, now);
        let reference = WorkspaceManager::scoped("reference").fixed_path(template, now);
        assert_eq!(subject, PathBuf::from("/tmp/ws-20260304-050607/subject"));
        assert_ne!(subject, reference);
        assert_eq!(
            WorkspaceManager::new().fixed_path(template, now),
            PathBuf::from("/tmp/ws-20260304-050607")
        );
    }

    #[tokio::test]
    async fn test_setup_writes_files_in_temp_workspace() {
        let uc = UseCase::builder("files", "p")
            .setup_file("src/Main.java", "class Main {}")
            .setup_file("README.md", "hi")
            .build()
            .unwrap();
        let manager = WorkspaceManager::new();
        let mut ctx = manager.setup(Arc::new(uc)).await.unwrap();

        let root = ctx.workspace().unwrap().to_path_buf();
        assert!(ctx.is_temporary());
        assert_eq!(ctx.created_paths().len(), 2);
        assert_eq!(
            std::fs::read_to_string(root.join("src/Main.java")).unwrap(),
            "class Main {}"
        );

        manager.cleanup(Some(&mut ctx)).await;
        assert!(ctx.is_closed());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_setup_rejects_escaping_file() {
        let uc = UseCase::builder("escape", "p")
            .setup_file("../outside.txt", "x")
            .build()
            .unwrap();
        let err = WorkspaceManager::new().setup(Arc::new(uc)).await.unwrap_err();
        assert!(err.to_string().contains("escapes"));
    }

    #[tokio::test]
    async fn test_cleanup_none_is_noop() {
        WorkspaceManager::new().cleanup(None).await;
    }
}

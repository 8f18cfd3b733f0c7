//! Directory tree copy and removal.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::error::{SandboxError, SandboxResult};

fn walk_error(root: &Path, err: walkdir::Error) -> SandboxError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    SandboxError::io(path, source)
}

/// Copy one file, creating the destination's parent directories.
pub fn copy_file(src: &Path, dst: &Path) -> SandboxResult<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| SandboxError::io(parent, e))?;
    }
    fs::copy(src, dst).map_err(|e| SandboxError::io(src, e))?;
    Ok(())
}

/// Copy the tree under `src` into `dst`, preserving relative structure.
///
/// Empty directories are recreated. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> SandboxResult<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| SandboxError::PathEscape(entry.path().to_path_buf()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| SandboxError::io(&target, e))?;
        } else {
            copy_file(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Delete `root` and everything beneath it.
///
/// Entries are visited contents-first so each directory is empty by the time
/// it is removed. A missing root is not an error.
pub fn remove_tree(root: &Path) -> SandboxResult<()> {
    if !root.exists() {
        return Ok(());
    }
    for entry in WalkDir::new(root).follow_links(false).contents_first(true) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|e| SandboxError::io(path, e))?;
    }
    Ok(())
}

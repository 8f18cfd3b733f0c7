//! On-disk cache of reference-agent runs.
//!
//! Layout: `<dir>/<sanitized use case name>.json`, each file an envelope
//! `{schema_version, digest, summary}` where `digest` is the SHA-256 hex of
//! the serialized summary. A missing, unreadable, corrupt or mismatched
//! entry is a miss, and so is an entry whose run did not succeed.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::domain::{ExecutionSummary, Result};
use crate::harness::sanitize_filename;
use crate::obs;

pub const CACHE_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    schema_version: String,
    digest: String,
    summary: ExecutionSummary,
}

fn summary_digest(summary: &ExecutionSummary) -> Result<String> {
    let bytes = serde_json::to_vec(summary)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[derive(Debug, Clone)]
pub struct ReferenceCache {
    dir: PathBuf,
}

impl ReferenceCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for `use_case_name`.
    pub fn entry_path(&self, use_case_name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_filename(use_case_name)))
    }

    /// A cached successful reference run, if one is usable.
    pub fn load(&self, use_case_name: &str) -> Option<ExecutionSummary> {
        let key = sanitize_filename(use_case_name);
        let summary = self.read_entry(&self.entry_path(use_case_name));
        obs::emit_cache_lookup(&key, summary.is_some());
        summary
    }

    fn read_entry(&self, path: &Path) -> Option<ExecutionSummary> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache entry");
                return None;
            }
        };
        let envelope: CacheEnvelope = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry");
                return None;
            }
        };
        if envelope.schema_version != CACHE_SCHEMA_VERSION {
            warn!(
                path = %path.display(),
                schema_version = %envelope.schema_version,
                "cache entry has foreign schema version"
            );
            return None;
        }
        match summary_digest(&envelope.summary) {
            Ok(digest) if digest == envelope.digest => {}
            _ => {
                warn!(path = %path.display(), "cache entry digest mismatch");
                return None;
            }
        }
        envelope.summary.success.then_some(envelope.summary)
    }

    /// Store a reference run. Unsuccessful runs are not cached.
    ///
    /// The entry is written to a temp file in the cache directory and then
    /// renamed into place.
    pub fn store(&self, use_case_name: &str, summary: &ExecutionSummary) -> Result<Option<PathBuf>> {
        if !summary.success {
            return Ok(None);
        }
        fs::create_dir_all(&self.dir)?;

        let envelope = CacheEnvelope {
            schema_version: CACHE_SCHEMA_VERSION.to_string(),
            digest: summary_digest(summary)?,
            summary: summary.clone(),
        };
        let path = self.entry_path(use_case_name);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(&envelope)?)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolCallEvent;

    fn summary(success: bool) -> ExecutionSummary {
        let mut s = ExecutionSummary::new("reference");
        s.success = success;
        s.record(ToolCallEvent::new("bash").with_input("command", "ls"));
        s
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ReferenceCache::new(dir.path());
        let path = cache.store("Hello World!", &summary(true)).unwrap().unwrap();
        assert!(path.ends_with("hello-world.json"));
        assert_eq!(cache.load("Hello World!"), Some(summary(true)));
    }

    #[test]
    fn test_failed_runs_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ReferenceCache::new(dir.path());
        assert_eq!(cache.store("case", &summary(false)).unwrap(), None);
        assert_eq!(cache.load("case"), None);
    }

    #[test]
    fn test_tampered_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ReferenceCache::new(dir.path());
        let path = cache.store("case", &summary(true)).unwrap().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("\"ls\"", "\"rm -rf\"")).unwrap();
        assert_eq!(cache.load("case"), None);

        std::fs::write(&path, "{ truncated").unwrap();
        assert_eq!(cache.load("case"), None);
    }
}

// src/state/cache.rs

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};

use crate::state::hash::hash_file;

/// Recorded file digests plus a per-run memo of change checks.
///
/// `snapshots` is what gets persisted. The memo only lives as long as this
/// value, so a file is hashed at most once per run unless its snapshot is
/// updated or invalidated.
///
/// Both are keyed by canonical path, so `./package.json`, `sub/../package.json`
/// and the absolute spelling all share one snapshot.
#[derive(Debug, Default)]
pub struct ContentCache {
    snapshots: BTreeMap<String, String>,
    changed: HashMap<PathBuf, bool>,
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Canonical form of `path`, or `path` itself when it cannot be resolved.
async fn canonical(path: &Path) -> PathBuf {
    tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf())
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshots(snapshots: BTreeMap<String, String>) -> Self {
        Self {
            snapshots,
            changed: HashMap::new(),
        }
    }

    pub fn snapshots(&self) -> &BTreeMap<String, String> {
        &self.snapshots
    }

    pub async fn digest(&self, path: &Path) -> Option<&str> {
        let path = canonical(path).await;
        self.snapshots.get(&key(&path)).map(String::as_str)
    }

    /// Whether `path` differs from its recorded digest.
    ///
    /// A missing file, or one never recorded, counts as changed.
    pub async fn file_changed(&mut self, path: &Path) -> Result<bool> {
        let path = canonical(path).await;
        if let Some(&changed) = self.changed.get(&path) {
            return Ok(changed);
        }

        let changed = if !is_file(&path).await {
            debug!(path = %path.display(), "file missing; treating as changed");
            true
        } else {
            let digest = hash_file(&path).await?;
            self.snapshots.get(&key(&path)) != Some(&digest)
        };

        self.changed.insert(path, changed);
        Ok(changed)
    }

    /// Record the current digest of `path`. A missing file is left alone.
    pub async fn update_snapshot(&mut self, path: &Path) -> Result<()> {
        let path = canonical(path).await;
        if !is_file(&path).await {
            warn!(path = %path.display(), "cannot snapshot missing file");
            return Ok(());
        }

        let digest = hash_file(&path).await?;
        debug!(path = %path.display(), digest = %digest, "updated file snapshot");
        self.snapshots.insert(key(&path), digest);
        self.changed.insert(path, false);
        Ok(())
    }

    /// Forget the memoised change check for `path`.
    pub async fn invalidate(&mut self, path: &Path) {
        let path = canonical(path).await;
        if self.changed.remove(&path).is_some() {
            debug!(path = %path.display(), "invalidated change check");
        }
    }

    /// Forget every memoised change check.
    pub fn invalidate_all(&mut self) {
        self.changed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_then_unchanged_then_changed_after_edit() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("package.json");
        std::fs::write(&file, "{}").unwrap();

        let mut cache = ContentCache::new();
        assert!(cache.file_changed(&file).await.unwrap());

        cache.update_snapshot(&file).await.unwrap();
        assert!(!cache.file_changed(&file).await.unwrap());

        std::fs::write(&file, "{\"a\":1}").unwrap();
        // Memoised until invalidated.
        assert!(!cache.file_changed(&file).await.unwrap());
        cache.invalidate(&file).await;
        assert!(cache.file_changed(&file).await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_is_changed_and_not_snapshotted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gone");

        let mut cache = ContentCache::new();
        cache.update_snapshot(&file).await.unwrap();
        assert!(cache.digest(&file).await.is_none());
        assert!(cache.file_changed(&file).await.unwrap());
    }

    #[tokio::test]
    async fn snapshot_is_shared_across_path_spellings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let file = dir.path().join("package.json");
        std::fs::write(&file, "{}").unwrap();

        let mut cache = ContentCache::new();
        cache
            .update_snapshot(&dir.path().join("sub").join("..").join("package.json"))
            .await
            .unwrap();

        // A later run reloads the snapshots and asks with another spelling.
        let mut reloaded = ContentCache::from_snapshots(cache.snapshots().clone());
        assert!(!reloaded.file_changed(&file).await.unwrap());
        assert!(!reloaded
            .file_changed(&dir.path().join(".").join("package.json"))
            .await
            .unwrap());
    }
}

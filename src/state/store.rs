// src/state/store.rs

//! Persistent build state.
//!
//! One JSON file per machine holds the state of every repository that has
//! been built on it, keyed by a repository-derived prefix:
//!
//! ```json
//! {
//!   "repos": {
//!     "tyche_": {
//!       "builds": [1, 2, 3],
//!       "files": { "/src/tyche/package.json": "9f86d0..." },
//!       "runs": { "build-cli": { "task_name": "build-cli", "tools_used": ["native"], ... } }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{Result, TycheError};
use crate::state::cache::ContentCache;

/// File name of the default store, placed in the user's home directory.
pub const DEFAULT_STATE_FILE: &str = ".tyche.json";

/// What tyche last did for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub task_name: String,
    /// Every tool the task has been run with, oldest first, no repeats.
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub last_revision: Option<String>,
    #[serde(default)]
    pub last_tool: Option<String>,
}

/// State of one repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoRecord {
    /// Append-only; the current build number is the maximum.
    #[serde(default)]
    pub builds: Vec<u64>,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub runs: BTreeMap<String, RunRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    repos: BTreeMap<String, RepoRecord>,
}

/// Build counter, run history and content cache for one repository, backed
/// by a shared store file.
///
/// Every accessor fails with [`TycheError::StoreNotInitialized`] until
/// [`initialize`](Self::initialize) has run.
#[derive(Debug)]
pub struct BuildState {
    path: PathBuf,
    prefix: String,
    store: StoreFile,
    cache: ContentCache,
    initialized: bool,
}

impl BuildState {
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.into(),
            store: StoreFile::default(),
            cache: ContentCache::new(),
            initialized: false,
        }
    }

    /// `~/.tyche.json`, or `./.tyche.json` when there is no home directory.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_STATE_FILE)
    }

    /// Create-and-initialize in one go.
    pub async fn open(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self> {
        let mut state = Self::new(path, prefix);
        state.initialize().await?;
        Ok(state)
    }

    /// Load the store file, creating it when it does not exist yet.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let exists = tokio::fs::try_exists(&self.path)
            .await
            .with_context(|| format!("checking state file {:?}", self.path))?;

        self.store = if exists {
            let text = tokio::fs::read_to_string(&self.path)
                .await
                .with_context(|| format!("reading state file {:?}", self.path))?;
            if text.trim().is_empty() {
                StoreFile::default()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            StoreFile::default()
        };

        let files = self
            .store
            .repos
            .get(&self.prefix)
            .map(|r| r.files.clone())
            .unwrap_or_default();
        self.cache = ContentCache::from_snapshots(files);
        self.initialized = true;

        if !exists {
            self.flush().await?;
        }

        info!(path = %self.path.display(), prefix = %self.prefix, "build state loaded");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(TycheError::StoreNotInitialized)
        }
    }

    fn repo(&self) -> Option<&RepoRecord> {
        self.store.repos.get(&self.prefix)
    }

    fn repo_mut(&mut self) -> &mut RepoRecord {
        self.store.repos.entry(self.prefix.clone()).or_default()
    }

    /// Whether `path` changed since its last snapshot.
    pub async fn file_changed(&mut self, path: &Path) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.cache.file_changed(path).await?)
    }

    /// Record the current content of `path` as its snapshot.
    pub async fn update_file_snapshot(&mut self, path: &Path) -> Result<()> {
        self.ensure_initialized()?;
        self.cache.update_snapshot(path).await?;
        Ok(())
    }

    pub fn cache_mut(&mut self) -> &mut ContentCache {
        &mut self.cache
    }

    /// Current build number, `0` before the first build.
    pub fn build_number(&self) -> Result<u64> {
        self.ensure_initialized()?;
        Ok(self
            .repo()
            .and_then(|r| r.builds.iter().copied().max())
            .unwrap_or(0))
    }

    /// Append `number` to the build record set.
    pub fn set_build_number(&mut self, number: u64) -> Result<()> {
        self.ensure_initialized()?;
        debug!(number, "recording build number");
        self.repo_mut().builds.push(number);
        Ok(())
    }

    /// Allocate and record the next build number.
    pub fn next_build_number(&mut self) -> Result<u64> {
        let next = self.build_number()? + 1;
        self.set_build_number(next)?;
        Ok(next)
    }

    pub fn run_record(&self, task: &str) -> Result<Option<&RunRecord>> {
        self.ensure_initialized()?;
        Ok(self.repo().and_then(|r| r.runs.get(task)))
    }

    /// Note that `task` ran with `tool` at `revision`.
    pub fn record_run(&mut self, task: &str, tool: &str, revision: Option<&str>) -> Result<()> {
        self.ensure_initialized()?;
        let record = self
            .repo_mut()
            .runs
            .entry(task.to_string())
            .or_insert_with(|| RunRecord {
                task_name: task.to_string(),
                ..RunRecord::default()
            });

        if !record.tools_used.iter().any(|t| t == tool) {
            record.tools_used.push(tool.to_string());
        }
        record.last_tool = Some(tool.to_string());
        if let Some(rev) = revision {
            record.last_revision = Some(rev.to_string());
        }
        Ok(())
    }

    /// Write the store to disk through a temporary file.
    pub async fn flush(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let files = self.cache.snapshots().clone();
        self.repo_mut().files = files;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating state directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(&self.store)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing state file {:?}", tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing state file {:?}", self.path))?;

        debug!(path = %self.path.display(), "build state flushed");
        Ok(())
    }

    /// Flush and release the store.
    pub async fn finish(mut self) -> Result<()> {
        self.flush().await?;
        info!(path = %self.path.display(), "build state closed");
        Ok(())
    }
}

// src/state/repo.rs

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

/// Repository a build runs in, used to key the shared state store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    pub root: PathBuf,
    pub name: String,
}

impl RepoContext {
    /// Find the git top-level above `start`. Outside a repository `start`
    /// itself is used.
    pub async fn discover(start: &Path) -> Self {
        let root = git(start, &["rev-parse", "--show-toplevel"])
            .await
            .map(PathBuf::from)
            .unwrap_or_else(|| start.to_path_buf());

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string());

        debug!(root = %root.display(), name = %name, "discovered repository");
        Self { root, name }
    }

    /// Key prefix of this repository inside the state store.
    pub fn prefix(&self) -> String {
        format!("{}_", self.name)
    }

    /// Commit `HEAD` points at, if this is a git repository with commits.
    pub async fn head_revision(&self) -> Option<String> {
        git(&self.root, &["rev-parse", "HEAD"]).await
    }
}

/// Run git in `dir` and return trimmed stdout on success.
async fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        debug!(?args, "git command failed");
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!stdout.is_empty()).then_some(stdout)
}

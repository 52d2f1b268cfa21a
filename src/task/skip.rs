// src/task/skip.rs

//! Skip decisions.
//!
//! Every declared predicate casts votes. A task is skipped when at least one
//! vote was cast and all of them were skip votes, or when it has been forced
//! for this run. During a real build, run history casts one more vote: a task
//! that never ran with the current tool has to run once before it can skip.

use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::dag::NodeId;
use crate::errors::Result;
use crate::state::BuildState;
use crate::task::tree::{Task, TaskTree};
use crate::tool::ToolRegistry;

/// Tally of skip predicate votes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipVotes {
    skip: usize,
    cast: usize,
}

impl SkipVotes {
    pub fn skip(&mut self) {
        self.skip += 1;
        self.cast += 1;
    }

    pub fn run(&mut self) {
        self.cast += 1;
    }

    pub fn cast(&self) -> usize {
        self.cast
    }

    pub fn unanimous(&self) -> bool {
        self.cast > 0 && self.skip == self.cast
    }
}

/// Files whose content decides `task`'s `files_not_changed` vote.
///
/// The declared paths, resolved against `workdir`, followed by `config_file`
/// when given. The config file is only watched by tasks that declare at least
/// one file of their own.
pub fn watched_files(task: &Task, workdir: &Path, config_file: Option<&Path>) -> Vec<PathBuf> {
    let declared = &task.skips.files_not_changed;
    let mut files: Vec<PathBuf> = declared.iter().map(|p| workdir.join(p)).collect();
    if !declared.is_empty() {
        files.extend(config_file.map(Path::to_path_buf));
    }
    files
}

/// Evaluates skip predicates against the filesystem, the build state and the
/// tool registry.
pub struct SkipPolicy<'a> {
    registry: &'a ToolRegistry,
    state: &'a mut BuildState,
    workdir: &'a Path,
    config_file: Option<&'a Path>,
    require_history: bool,
}

impl<'a> SkipPolicy<'a> {
    pub fn new(registry: &'a ToolRegistry, state: &'a mut BuildState, workdir: &'a Path) -> Self {
        Self {
            registry,
            state,
            workdir,
            config_file: None,
            require_history: false,
        }
    }

    /// Treat an edit of `config_file` as a change for every task that
    /// watches files.
    pub fn with_config_file(mut self, config_file: Option<&'a Path>) -> Self {
        self.config_file = config_file;
        self
    }

    /// Refuse to skip a task that has never run with the tool it would run
    /// with now. Real builds turn this on; previews leave it off.
    pub fn require_history(mut self, require: bool) -> Self {
        self.require_history = require;
        self
    }

    /// Count the votes of `id`'s predicates when it would run with `tool`.
    ///
    /// `path_exists` and `files_not_changed` paths are relative to the
    /// working directory. With [`require_history`](Self::require_history),
    /// a task that has predicates but no run record for `tool` gets one
    /// extra run vote.
    pub async fn votes(&mut self, tree: &TaskTree, id: NodeId, tool: &str) -> Result<SkipVotes> {
        let task = tree.task(id);
        let mut votes = SkipVotes::default();

        for path in &task.skips.path_exists {
            let full = self.workdir.join(path);
            // An unreadable location counts as missing.
            let exists = tokio::fs::try_exists(&full).await.unwrap_or(false);
            trace!(task = %task.name, path = %full.display(), exists, "path_exists vote");
            if exists {
                votes.skip();
            } else {
                votes.run();
            }
        }

        for full in watched_files(task, self.workdir, self.config_file) {
            let changed = self.state.file_changed(&full).await?;
            trace!(task = %task.name, path = %full.display(), changed, "files_not_changed vote");
            if changed {
                votes.run();
            } else {
                votes.skip();
            }
        }

        if self.require_history && votes.cast() > 0 {
            let ran_with_tool = self
                .state
                .run_record(&task.name)?
                .is_some_and(|record| record.tools_used.iter().any(|t| t == tool));
            if !ran_with_tool {
                debug!(task = %task.name, tool, "never ran with this tool; voting run");
                votes.run();
            }
        }

        Ok(votes)
    }

    /// Decide whether `id` is skipped when the caller prefers `preferred`.
    ///
    /// A task whose `exec` map has no step for the effective tool is forced
    /// to skip. When the result is a skip and the task sets
    /// `skip_dependencies_if_skip`, every task below it is forced too.
    pub async fn should_skip(
        &mut self,
        tree: &mut TaskTree,
        id: NodeId,
        preferred: &str,
    ) -> Result<bool> {
        let tool = tree.task(id).constraints.effective_tool(preferred).to_string();
        let votes = self.votes(tree, id, &tool).await?;

        if self.tool_unavailable(tree, id, preferred)? {
            tree.mark_skip(id, true, false);
        }

        let skipped = votes.unanimous() || tree.is_forced(id);

        if skipped && tree.task(id).skips.skip_dependencies_if_skip {
            debug!(task = %tree.name(id), "skipping every dependency");
            tree.mark_skip(id, true, true);
        }

        debug!(
            task = %tree.name(id),
            cast = votes.cast(),
            forced = tree.is_forced(id),
            skipped,
            "skip decision"
        );
        Ok(skipped)
    }

    /// True when `id` has an `exec` map but no key the effective tool knows.
    fn tool_unavailable(&self, tree: &TaskTree, id: NodeId, preferred: &str) -> Result<bool> {
        let task = tree.task(id);
        let Some(exec) = &task.exec else {
            return Ok(false);
        };

        let tool = task.constraints.effective_tool(preferred);
        if tool != preferred {
            warn!(task = %task.name, preferred, tool, "task overrides the preferred tool");
        }

        let known = self.registry.knows(tool)?;
        let unavailable = !exec.keys().any(|key| known.iter().any(|k| k == key));
        if unavailable {
            debug!(task = %task.name, tool, "no step for tool; forcing skip");
        }
        Ok(unavailable)
    }
}

// src/engine/session.rs

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::bus::{BusEvent, EventBus};
use crate::dag::NodeId;
use crate::errors::{Result, TycheError};
use crate::state::BuildState;
use crate::task::skip::watched_files;
use crate::task::{SkipPolicy, TaskTree};
use crate::tool::{StepContext, ToolAdapter, ToolRegistry};

use super::interrupt::InterruptGuard;
use super::{BUILD_NUMBER_ENV, RunMode, SessionOptions, TaskReport};

/// One build invocation over a task tree.
///
/// The session borrows everything it touches. The tree's forced-skip flags
/// and the build state are mutated; the bus and the registry are shared.
pub struct BuildSession<'a> {
    tree: &'a mut TaskTree,
    state: &'a mut BuildState,
    bus: &'a EventBus,
    registry: &'a ToolRegistry,
    options: SessionOptions,
}

/// Adapter prepared for one task.
struct PreparedStep {
    tool: String,
    adapter: Box<dyn ToolAdapter>,
    /// `None` when the task has no usable step for `tool`.
    rendered: Option<String>,
}

impl<'a> BuildSession<'a> {
    pub fn new(
        tree: &'a mut TaskTree,
        state: &'a mut BuildState,
        bus: &'a EventBus,
        registry: &'a ToolRegistry,
        options: SessionOptions,
    ) -> Self {
        Self {
            tree,
            state,
            bus,
            registry,
            options,
        }
    }

    /// Run `target` and everything it depends on with `preferred` tool.
    pub async fn execute(&mut self, target: &str, preferred: &str) -> Result<Vec<TaskReport>> {
        self.run(target, preferred, None, RunMode::Execute).await
    }

    /// Preview `target` without launching anything.
    pub async fn dry(&mut self, target: &str, preferred: &str) -> Result<Vec<TaskReport>> {
        self.run(target, preferred, None, RunMode::Dry).await
    }

    /// [`execute`](Self::execute), stopping after the task named `stop_at`.
    pub async fn execute_until(
        &mut self,
        target: &str,
        preferred: &str,
        stop_at: &str,
    ) -> Result<Vec<TaskReport>> {
        self.run(target, preferred, Some(stop_at), RunMode::Execute)
            .await
    }

    /// [`dry`](Self::dry), stopping after the task named `stop_at`.
    pub async fn dry_until(
        &mut self,
        target: &str,
        preferred: &str,
        stop_at: &str,
    ) -> Result<Vec<TaskReport>> {
        self.run(target, preferred, Some(stop_at), RunMode::Dry).await
    }

    pub async fn run(
        &mut self,
        target: &str,
        preferred: &str,
        stop_at: Option<&str>,
        mode: RunMode,
    ) -> Result<Vec<TaskReport>> {
        // Unknown tools fail before anything is touched.
        self.registry.create(preferred)?;

        let target_id = self.tree.require(target)?;
        let order = self.tree.resolve(target_id, stop_at)?;

        self.tree.reset_forced();
        self.state.cache_mut().invalidate_all();

        let build_number = match mode {
            RunMode::Execute => self.state.next_build_number()?,
            RunMode::Dry => self.state.build_number()?,
        };
        info!(
            task = %target,
            tool = preferred,
            build_number,
            ?mode,
            tasks = order.len(),
            "starting build"
        );

        let guard = match mode {
            RunMode::Execute => Some(InterruptGuard::install(target)?),
            RunMode::Dry => None,
        };

        // Parents are decided first so `skip_dependencies_if_skip` reaches
        // the tasks below them before those are visited.
        for &id in order.iter().rev() {
            if self.tree.task(id).skips.skip_dependencies_if_skip {
                self.should_skip(id, preferred, mode).await?;
            }
        }

        let mut reports = Vec::with_capacity(order.len());
        for id in order {
            if guard.as_ref().is_some_and(InterruptGuard::interrupted) {
                let name = self.tree.name(id).to_string();
                warn!(task = %name, "build interrupted before task started");
                return Err(TycheError::Interrupted(name));
            }
            let report = self
                .visit(id, preferred, build_number, mode, guard.as_ref())
                .await?;
            reports.push(report);
        }

        info!(task = %target, tasks = reports.len(), "build finished");
        Ok(reports)
    }

    async fn should_skip(&mut self, id: NodeId, preferred: &str, mode: RunMode) -> Result<bool> {
        SkipPolicy::new(self.registry, self.state, &self.options.workdir)
            .with_config_file(self.options.config_file.as_deref())
            .require_history(mode == RunMode::Execute)
            .should_skip(self.tree, id, preferred)
            .await
    }

    fn prepare(&self, id: NodeId, preferred: &str, build_number: u64) -> Result<Option<PreparedStep>> {
        let task = self.tree.task(id);
        let Some(exec) = &task.exec else {
            return Ok(None);
        };

        let tool = task.constraints.effective_tool(preferred).to_string();
        let mut adapter = self.registry.create(&tool)?;
        let built = adapter.build_from_step(&StepContext {
            task: &task.name,
            exec,
            workdir: &self.options.workdir,
            passthrough: &self.options.passthrough_args,
        });

        let rendered = if built {
            adapter.set_meta(BTreeMap::from([(
                BUILD_NUMBER_ENV.to_string(),
                build_number.to_string(),
            )]));
            Some(adapter.dry_run()?)
        } else {
            None
        };

        Ok(Some(PreparedStep {
            tool,
            adapter,
            rendered,
        }))
    }

    async fn visit(
        &mut self,
        id: NodeId,
        preferred: &str,
        build_number: u64,
        mode: RunMode,
        guard: Option<&InterruptGuard>,
    ) -> Result<TaskReport> {
        let name = self.tree.name(id).to_string();
        let prepared = self.prepare(id, preferred, build_number)?;
        let skipped = self.should_skip(id, preferred, mode).await?;

        let mut report = TaskReport {
            name: name.clone(),
            exec: prepared.as_ref().and_then(|p| p.rendered.clone()),
            result: None,
            skipped,
        };

        if mode == RunMode::Dry {
            debug!(task = %name, skipped, "dry visit");
            return Ok(report);
        }

        if let Some(step) = prepared.filter(|_| !skipped) {
            report.result = Some(self.run_step(id, step, guard).await?);
        } else if skipped {
            info!(task = %name, "skipped");
        }

        self.bus.emit(BusEvent::Task {
            name,
            code: report.result,
        });
        Ok(report)
    }

    /// Launch one step and record its success. Any failure aborts the build.
    async fn run_step(
        &mut self,
        id: NodeId,
        mut step: PreparedStep,
        guard: Option<&InterruptGuard>,
    ) -> Result<i32> {
        let name = self.tree.name(id).to_string();

        if step.rendered.is_none() {
            return Err(TycheError::NoCompatibleTool {
                task: name,
                tool: step.tool,
            });
        }

        let program = step
            .adapter
            .native_command()
            .map(|cmd| cmd.program)
            .unwrap_or_default();

        let outcome = step.adapter.exec_tool(self.options.show_output).await?;

        if guard.is_some_and(InterruptGuard::interrupted) {
            warn!(task = %name, "build interrupted");
            return Err(TycheError::Interrupted(name));
        }

        if let Some(reason) = outcome.launch_error {
            return Err(TycheError::LaunchFailed {
                task: name,
                program,
                reason,
            });
        }

        if outcome.code != 0 {
            return Err(TycheError::BuildFailed {
                task: name,
                code: outcome.code,
            });
        }

        let watched = watched_files(
            self.tree.task(id),
            &self.options.workdir,
            self.options.config_file.as_deref(),
        );
        for path in watched {
            self.state.update_file_snapshot(&path).await?;
        }

        self.state
            .record_run(&name, &step.tool, self.options.revision.as_deref())?;
        self.state.flush().await?;

        info!(task = %name, tool = %step.tool, "task succeeded");
        Ok(outcome.code)
    }
}

// src/tool/mod.rs

//! Tool adapters.
//!
//! A tool adapter turns the step a task declares for it into one concrete
//! subprocess invocation. The engine only talks to the [`ToolAdapter`] trait,
//! and picks implementations through the [`ToolRegistry`].
//!
//! - [`NativeTool`] runs the step's command directly.
//! - [`ComposeTool`] wraps the step in a `docker compose` invocation.
//! - Tests can register their own adapter that records what it was asked to
//!   run instead of spawning anything.

pub mod command;
pub mod compose;
pub mod native;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;

use crate::config::model::ExecMap;
use crate::errors::{Result, TycheError};

pub use command::{ExecOutcome, LAUNCH_FAILURE_CODE, PreparedCommand};
pub use compose::ComposeTool;
pub use native::NativeTool;
pub use registry::ToolRegistry;

/// Inputs an adapter needs to build its command for one task.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub task: &'a str,
    pub exec: &'a ExecMap,
    /// Directory relative step paths are resolved against.
    pub workdir: &'a Path,
    /// Extra arguments forwarded by the caller to steps that accept them.
    pub passthrough: &'a [String],
}

/// Command built by an adapter, plus the environment it was given.
#[derive(Debug, Clone, Default)]
pub struct CommandState {
    pub command: Option<PreparedCommand>,
    pub meta: BTreeMap<String, String>,
}

/// Capability every tool adapter provides.
pub trait ToolAdapter: Send {
    /// Registry key of this adapter.
    fn tool_name(&self) -> &str;

    /// Step keys this adapter understands, most specific first.
    fn knows(&self) -> Vec<String>;

    /// Build the command from the first matching step.
    ///
    /// Returns `false` when the task has no step for this adapter.
    fn build_from_step(&mut self, ctx: &StepContext<'_>) -> bool;

    fn state(&self) -> &CommandState;

    fn state_mut(&mut self) -> &mut CommandState;

    /// The command that will run, with `meta` merged into its environment.
    fn native_command(&self) -> Option<PreparedCommand> {
        let state = self.state();
        state.command.clone().map(|mut cmd| {
            cmd.env
                .extend(state.meta.iter().map(|(k, v)| (k.clone(), v.clone())));
            cmd
        })
    }

    /// Merge `meta` into the environment passed to the command.
    fn set_meta(&mut self, meta: BTreeMap<String, String>) {
        self.state_mut().meta.extend(meta);
    }

    /// Render the command line without running it.
    fn dry_run(&self) -> Result<String> {
        self.native_command()
            .map(|cmd| cmd.render())
            .ok_or_else(|| TycheError::UninitializedCommand(self.tool_name().to_string()))
    }

    /// Run the built command once.
    ///
    /// A missing or non-executable program resolves to an outcome carrying
    /// [`LAUNCH_FAILURE_CODE`] rather than an error.
    fn exec_tool(
        &mut self,
        show_output: bool,
    ) -> Pin<Box<dyn Future<Output = Result<ExecOutcome>> + Send + '_>> {
        let cmd = self.native_command();
        let name = self.tool_name().to_string();

        Box::pin(async move {
            match cmd {
                Some(cmd) => Ok(cmd.run(show_output).await),
                None => Err(TycheError::UninitializedCommand(name)),
            }
        })
    }
}

/// Adapters shipped with tyche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Native,
    Compose,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::Native, ToolKind::Compose];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Native => "native",
            ToolKind::Compose => "compose",
        }
    }

    pub fn create(&self) -> Box<dyn ToolAdapter> {
        match self {
            ToolKind::Native => Box::new(NativeTool::new()),
            ToolKind::Compose => Box::new(ComposeTool::new()),
        }
    }
}

impl FromStr for ToolKind {
    type Err = TycheError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "native" => Ok(ToolKind::Native),
            "compose" | "docker-compose" => Ok(ToolKind::Compose),
            other => Err(TycheError::UnknownTool(other.to_string())),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First key of `exec` present in `keys`, in `keys` order.
pub(crate) fn first_known_step<'e>(
    exec: &'e ExecMap,
    keys: &[String],
) -> Option<(&'e str, &'e crate::config::model::StepDefinition)> {
    keys.iter()
        .find_map(|key| exec.get_key_value(key.as_str()))
        .map(|(k, step)| (k.as_str(), step))
}

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tyche::errors::{Result, TycheError};
use tyche::tool::{
    CommandState, ExecOutcome, PreparedCommand, StepContext, ToolAdapter, ToolRegistry,
};

/// One `exec_tool` call seen by a [`RecordingTool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRun {
    pub task: String,
    /// Rendered command line, environment included.
    pub command: String,
}

pub type RunLog = Arc<Mutex<Vec<RecordedRun>>>;

/// A fake tool adapter that:
/// - understands exactly one step key
/// - records every run instead of spawning a process
/// - reports a fixed exit code (0 unless told otherwise)
pub struct RecordingTool {
    key: String,
    exit_code: i32,
    log: RunLog,
    task: Option<String>,
    state: CommandState,
}

impl RecordingTool {
    pub fn new(key: &str, log: RunLog) -> Self {
        Self {
            key: key.to_string(),
            exit_code: 0,
            log,
            task: None,
            state: CommandState::default(),
        }
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// A registry where `key` resolves to a recording tool.
    pub fn registry(key: &str, exit_code: i32, log: RunLog) -> ToolRegistry {
        Self::registry_with(&[key], exit_code, log)
    }

    /// A registry with one recording tool per key, all writing to `log`.
    pub fn registry_with(keys: &[&str], exit_code: i32, log: RunLog) -> ToolRegistry {
        let mut registry = ToolRegistry::empty();
        for &key in keys {
            let name = key.to_string();
            let log = Arc::clone(&log);
            registry.register(key, move || -> Box<dyn ToolAdapter> {
                Box::new(RecordingTool::new(&name, Arc::clone(&log)).with_exit_code(exit_code))
            });
        }
        registry
    }

    pub fn tasks(log: &RunLog) -> Vec<String> {
        log.lock().unwrap().iter().map(|r| r.task.clone()).collect()
    }
}

impl ToolAdapter for RecordingTool {
    fn tool_name(&self) -> &str {
        &self.key
    }

    fn knows(&self) -> Vec<String> {
        vec![self.key.clone()]
    }

    fn build_from_step(&mut self, ctx: &StepContext<'_>) -> bool {
        let Some(step) = ctx.exec.get(&self.key) else {
            return false;
        };
        let Some((program, args)) = step.command.split_first() else {
            return false;
        };
        self.task = Some(ctx.task.to_string());
        self.state.command = Some(PreparedCommand::new(program.clone(), args.to_vec()));
        true
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn exec_tool(
        &mut self,
        _show_output: bool,
    ) -> Pin<Box<dyn Future<Output = Result<ExecOutcome>> + Send + '_>> {
        let command = self.native_command();
        let task = self.task.clone().unwrap_or_default();
        let log = Arc::clone(&self.log);
        let code = self.exit_code;
        let key = self.key.clone();

        Box::pin(async move {
            let Some(command) = command else {
                return Err(TycheError::UninitializedCommand(key));
            };
            log.lock().unwrap().push(RecordedRun {
                task,
                command: command.render(),
            });
            Ok(ExecOutcome::exited(code))
        })
    }
}

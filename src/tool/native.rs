// src/tool/native.rs

use tracing::debug;

use crate::tool::command::PreparedCommand;
use crate::tool::{CommandState, StepContext, ToolAdapter, first_known_step};

/// Runs a step's `command` directly on the host.
///
/// Step keys are tried from most to least specific: `native-<os>`, then
/// `native-nix` or `native-win`, then plain `native`.
#[derive(Debug, Clone, Default)]
pub struct NativeTool {
    state: CommandState,
}

impl NativeTool {
    pub fn new() -> Self {
        Self::default()
    }
}

fn family_key() -> &'static str {
    if cfg!(windows) { "native-win" } else { "native-nix" }
}

impl ToolAdapter for NativeTool {
    fn tool_name(&self) -> &str {
        "native"
    }

    fn knows(&self) -> Vec<String> {
        vec![
            format!("native-{}", std::env::consts::OS),
            family_key().to_string(),
            "native".to_string(),
        ]
    }

    fn build_from_step(&mut self, ctx: &StepContext<'_>) -> bool {
        let Some((key, step)) = first_known_step(ctx.exec, &self.knows()) else {
            return false;
        };

        let Some((program, args)) = step.command.split_first() else {
            debug!(task = %ctx.task, key, "native step has an empty command");
            return false;
        };

        let mut args = args.to_vec();
        if step.accepts_args {
            args.extend(ctx.passthrough.iter().cloned());
        }

        let cwd = step
            .working
            .as_ref()
            .map(|dir| ctx.workdir.join(dir))
            .unwrap_or_else(|| ctx.workdir.to_path_buf());

        debug!(task = %ctx.task, key, program = %program, "built native command");
        self.state.command = Some(PreparedCommand::new(program.clone(), args).with_cwd(Some(cwd)));
        true
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::model::{ExecMap, StepDefinition};

    fn step(command: &[&str]) -> StepDefinition {
        StepDefinition {
            command: command.iter().map(|s| s.to_string()).collect(),
            ..StepDefinition::default()
        }
    }

    #[test]
    fn platform_key_wins_over_generic() {
        let mut exec = ExecMap::new();
        exec.insert("native".to_string(), step(&["echo", "generic"]));
        exec.insert(
            format!("native-{}", std::env::consts::OS),
            step(&["echo", "specific"]),
        );

        let mut tool = NativeTool::new();
        let ctx = StepContext {
            task: "t",
            exec: &exec,
            workdir: Path::new("/work"),
            passthrough: &[],
        };
        assert!(tool.build_from_step(&ctx));
        assert_eq!(tool.dry_run().unwrap(), "echo specific");
    }

    #[test]
    fn accepts_args_appends_passthrough() {
        let mut exec = ExecMap::new();
        let mut s = step(&["cargo", "test"]);
        s.accepts_args = true;
        exec.insert("native".to_string(), s);

        let extra = vec!["--".to_string(), "--nocapture".to_string()];
        let mut tool = NativeTool::new();
        let ctx = StepContext {
            task: "t",
            exec: &exec,
            workdir: Path::new("/work"),
            passthrough: &extra,
        };
        assert!(tool.build_from_step(&ctx));
        assert_eq!(tool.dry_run().unwrap(), "cargo test -- --nocapture");
    }

    #[test]
    fn unknown_key_is_not_built() {
        let mut exec = ExecMap::new();
        exec.insert("compose".to_string(), step(&["migrate"]));

        let mut tool = NativeTool::new();
        let ctx = StepContext {
            task: "t",
            exec: &exec,
            workdir: Path::new("/work"),
            passthrough: &[],
        };
        assert!(!tool.build_from_step(&ctx));
        assert!(tool.dry_run().is_err());
    }
}

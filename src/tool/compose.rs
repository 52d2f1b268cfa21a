// src/tool/compose.rs

use tracing::debug;

use crate::tool::command::PreparedCommand;
use crate::tool::{CommandState, StepContext, ToolAdapter, first_known_step};

const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";
const DEFAULT_ACTION: &str = "up";

/// Runs a step through `docker compose`.
///
/// The rendered command is
/// `docker compose -f <file> <action> [-v] [services...] [command...]`,
/// where `-v` is only passed to `down` when the step sets `volumes`.
#[derive(Debug, Clone, Default)]
pub struct ComposeTool {
    state: CommandState,
}

impl ComposeTool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ToolAdapter for ComposeTool {
    fn tool_name(&self) -> &str {
        "compose"
    }

    fn knows(&self) -> Vec<String> {
        vec!["compose".to_string(), "docker-compose".to_string()]
    }

    fn build_from_step(&mut self, ctx: &StepContext<'_>) -> bool {
        let Some((key, step)) = first_known_step(ctx.exec, &self.knows()) else {
            return false;
        };

        let action = step.action.as_deref().unwrap_or(DEFAULT_ACTION);
        let mut args = vec![
            "compose".to_string(),
            "-f".to_string(),
            step.file
                .clone()
                .unwrap_or_else(|| DEFAULT_COMPOSE_FILE.to_string()),
            action.to_string(),
        ];

        if action == "down" && step.volumes {
            args.push("-v".to_string());
        }
        if let Some(services) = &step.service {
            args.extend(services.names().into_iter().map(str::to_string));
        }
        args.extend(step.command.iter().cloned());
        if step.accepts_args {
            args.extend(ctx.passthrough.iter().cloned());
        }

        let cwd = step
            .working
            .as_ref()
            .map(|dir| ctx.workdir.join(dir))
            .unwrap_or_else(|| ctx.workdir.to_path_buf());

        debug!(task = %ctx.task, key, action, "built compose command");
        self.state.command = Some(PreparedCommand::new("docker", args).with_cwd(Some(cwd)));
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
    use std::collections::BTreeMap;
    use std::path::Path;

    use super::*;
    use crate::config::model::{ExecMap, ServiceSelection, StepDefinition};

    fn build(step: StepDefinition, key: &str) -> ComposeTool {
        let mut exec = ExecMap::new();
        exec.insert(key.to_string(), step);
        let mut tool = ComposeTool::new();
        let ctx = StepContext {
            task: "db",
            exec: &exec,
            workdir: Path::new("/work"),
            passthrough: &[],
        };
        assert!(tool.build_from_step(&ctx));
        tool
    }

    #[test]
    fn defaults_to_up_with_default_file() {
        let tool = build(StepDefinition::default(), "compose");
        assert_eq!(
            tool.dry_run().unwrap(),
            "docker compose -f docker-compose.yml up"
        );
    }

    #[test]
    fn down_with_volumes_and_services() {
        let step = StepDefinition {
            file: Some("stack.yml".to_string()),
            action: Some("down".to_string()),
            volumes: true,
            service: Some(ServiceSelection::Many(vec![
                "db".to_string(),
                "cache".to_string(),
            ])),
            ..StepDefinition::default()
        };
        let tool = build(step, "docker-compose");
        assert_eq!(
            tool.dry_run().unwrap(),
            "docker compose -f stack.yml down -v db cache"
        );
    }

    #[test]
    fn meta_is_rendered_before_the_command() {
        let mut tool = build(StepDefinition::default(), "compose");
        tool.set_meta(BTreeMap::from([("BUILD_NUMBER".to_string(), "7".to_string())]));
        assert_eq!(
            tool.dry_run().unwrap(),
            "BUILD_NUMBER=7 docker compose -f docker-compose.yml up"
        );
    }
}

use std::path::PathBuf;

use tyche::config::{
    ConfigFile, ConfigSection, ExecMap, RawConfigFile, StepDefinition, TaskDefinition, TaskEntry,
};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                tasks: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.config.tasks.push(task);
        self
    }

    pub fn with_default_tool(mut self, tool: &str) -> Self {
        self.config.config.default_tool = Some(tool.to_string());
        self
    }

    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config.state_file = Some(path.into());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskDefinition`.
pub struct TaskDefinitionBuilder {
    task: TaskDefinition,
}

impl TaskDefinitionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: TaskDefinition {
                name: name.to_string(),
                ..TaskDefinition::default()
            },
        }
    }

    /// Add a step for `tool` running `command`.
    pub fn exec(self, tool: &str, command: &[&str]) -> Self {
        self.step(
            tool,
            StepDefinition {
                command: command.iter().map(|s| s.to_string()).collect(),
                ..StepDefinition::default()
            },
        )
    }

    pub fn step(mut self, tool: &str, step: StepDefinition) -> Self {
        self.task
            .exec
            .get_or_insert_with(ExecMap::new)
            .insert(tool.to_string(), step);
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.task.description = Some(text.to_string());
        self
    }

    pub fn depends_on(mut self, name: &str) -> Self {
        self.task.dependencies.push(name.to_string());
        self
    }

    /// Nested child definition.
    pub fn child(mut self, child: TaskDefinition) -> Self {
        self.task.tasks.push(TaskEntry::Definition(Box::new(child)));
        self
    }

    /// Child referenced by name.
    pub fn child_ref(mut self, name: &str) -> Self {
        self.task.tasks.push(TaskEntry::Name(name.to_string()));
        self
    }

    pub fn skip_if_exists(mut self, path: &str) -> Self {
        self.task.skips.path_exists.push(PathBuf::from(path));
        self
    }

    pub fn skip_if_unchanged(mut self, path: &str) -> Self {
        self.task.skips.files_not_changed.push(PathBuf::from(path));
        self
    }

    pub fn skip_dependencies_if_skip(mut self) -> Self {
        self.task.skips.skip_dependencies_if_skip = true;
        self
    }

    pub fn always_use_tool(mut self, tool: &str) -> Self {
        self.task.constraints.always_use_tool = Some(tool.to_string());
        self.task.constraints.ignore_preferred_tool = true;
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.task
    }
}

// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

/// Mapping from tool key (`native`, `native-linux`, `compose`, ...) to the
/// step that tool should run.
pub type ExecMap = BTreeMap<String, StepDefinition>;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// default_tool = "native"
///
/// [[tasks]]
/// name = "build"
/// tasks = ["dependencies", { name = "build-cli", exec.native.command = ["cargo", "build"] }]
///
/// [[tasks]]
/// name = "dependencies"
/// skips = { path_exists = ["node_modules"], files_not_changed = ["package.json"] }
/// exec.native.command = ["npm", "install"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

/// A validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, which rejects duplicate
/// names, unknown references and dependency cycles.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub tasks: Vec<TaskDefinition>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, tasks: Vec<TaskDefinition>) -> Self {
        Self { config, tasks }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// Tool used when the caller does not name one.
    #[serde(default)]
    pub default_tool: Option<String>,

    /// Location of the build state file. Defaults to `~/.tyche.json`.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl ConfigSection {
    pub fn effective_default_tool(&self) -> &str {
        self.default_tool.as_deref().unwrap_or("native")
    }
}

/// One task definition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskDefinition {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Absent for pure grouping tasks.
    #[serde(default)]
    pub exec: Option<ExecMap>,

    /// Owned children: nested definitions, or bare names of tasks defined
    /// elsewhere in the same configuration.
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,

    /// Names of tasks that must run before this one.
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub skips: SkipRules,

    #[serde(default)]
    pub constraints: Constraints,
}

/// Entry of a `tasks = [...]` list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TaskEntry {
    Name(String),
    Definition(Box<TaskDefinition>),
}

/// Option bag shared by every tool adapter; each adapter reads the fields it
/// understands.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StepDefinition {
    /// Program followed by its arguments (native), or extra words appended
    /// to the compose invocation.
    #[serde(default)]
    pub command: Vec<String>,

    /// Working directory, relative to the build's working directory.
    #[serde(default)]
    pub working: Option<PathBuf>,

    /// Append the caller's pass-through arguments to `command`.
    #[serde(default, alias = "acceptsArgs")]
    pub accepts_args: bool,

    /// Compose file (compose only).
    #[serde(default)]
    pub file: Option<String>,

    /// Compose action such as `up`, `down`, `run` (compose only).
    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub service: Option<ServiceSelection>,

    /// Pass `-v` to `down` (compose only).
    #[serde(default)]
    pub volumes: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServiceSelection {
    One(String),
    Many(Vec<String>),
}

impl ServiceSelection {
    pub fn names(&self) -> Vec<&str> {
        match self {
            ServiceSelection::One(name) => vec![name.as_str()],
            ServiceSelection::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Declarative skip predicates.
///
/// `path_exists` and `files_not_changed` accept either one path or a list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SkipRules {
    #[serde(default, deserialize_with = "one_or_many")]
    pub path_exists: Vec<PathBuf>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub files_not_changed: Vec<PathBuf>,

    /// When this task is skipped, force-skip every task below it too.
    #[serde(default)]
    pub skip_dependencies_if_skip: bool,
}

impl SkipRules {
    /// Whether any voting predicate is declared.
    pub fn has_predicates(&self) -> bool {
        !self.path_exists.is_empty() || !self.files_not_changed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub always_use_tool: Option<String>,

    #[serde(default)]
    pub ignore_preferred_tool: bool,
}

impl Constraints {
    /// Tool a task actually runs with, given the caller's preference.
    ///
    /// `always_use_tool` only wins when `ignore_preferred_tool` is set.
    pub fn effective_tool<'a>(&'a self, preferred: &'a str) -> &'a str {
        match (&self.always_use_tool, self.ignore_preferred_tool) {
            (Some(tool), true) => tool.as_str(),
            _ => preferred,
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(PathBuf),
        Many(Vec<PathBuf>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}

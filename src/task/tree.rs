// src/task/tree.rs

//! Task tree construction and cross-reference resolution.
//!
//! Building happens in two phases:
//! 1. every definition (nested ones included) becomes a node in the arena,
//!    and each child slot is recorded either as an already-built node or as
//!    a pending name;
//! 2. pending names are looked up in the global name index and turned into
//!    edges. Anything left over is reported in one
//!    [`TycheError::UnresolvedDependency`].

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::config::model::{ConfigFile, Constraints, ExecMap, SkipRules, TaskDefinition, TaskEntry};
use crate::dag::{DepGraph, NodeId};
use crate::errors::{Result, TycheError};

/// Name of the synthetic task wrapping a configuration's top-level list.
pub const ROOT_TASK_NAME: &str = "<root>";

/// Per-task data that lives next to its graph node.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub description: Option<String>,
    pub exec: Option<ExecMap>,
    pub skips: SkipRules,
    pub constraints: Constraints,
    /// Forced skip for the current invocation only.
    pub(crate) forced: bool,
}

impl Task {
    fn from_definition(def: &TaskDefinition) -> Self {
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            exec: def.exec.clone(),
            skips: def.skips.clone(),
            constraints: def.constraints.clone(),
            forced: false,
        }
    }

    fn root() -> Self {
        Self {
            name: ROOT_TASK_NAME.to_string(),
            description: None,
            exec: None,
            skips: SkipRules::default(),
            constraints: Constraints::default(),
            forced: false,
        }
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }
}

/// A fully resolved task tree.
///
/// Task ids and graph node ids are the same index. Edges point from a task to
/// its children: named dependencies first, then nested or referenced tasks.
#[derive(Debug, Clone)]
pub struct TaskTree {
    graph: DepGraph,
    tasks: Vec<Task>,
    root: NodeId,
}

impl TaskTree {
    /// Build the tree for a validated configuration.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Self::from_definitions(&cfg.tasks)
    }

    /// Build a tree whose synthetic root owns `defs`.
    pub fn from_definitions(defs: &[TaskDefinition]) -> Result<Self> {
        let root = TaskDefinition {
            name: ROOT_TASK_NAME.to_string(),
            tasks: defs
                .iter()
                .cloned()
                .map(|d| TaskEntry::Definition(Box::new(d)))
                .collect(),
            ..TaskDefinition::default()
        };
        Self::build(&root)
    }

    /// Build a tree rooted at `root_def` itself.
    pub fn build(root_def: &TaskDefinition) -> Result<Self> {
        let mut builder = TreeBuilder::default();
        let root = builder.insert(root_def)?;
        let tree = builder.link(root)?;
        debug!(tasks = tree.tasks.len(), root = %tree.name(root), "built task tree");
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.graph.find(name)
    }

    /// Like [`find`](Self::find), failing with [`TycheError::TaskNotFound`].
    pub fn require(&self, name: &str) -> Result<NodeId> {
        self.find(name)
            .ok_or_else(|| TycheError::TaskNotFound(name.to_string()))
    }

    pub fn task(&self, id: NodeId) -> &Task {
        &self.tasks[id]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.tasks[id].name
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.graph.edges(id)
    }

    pub fn child_names(&self, id: NodeId) -> Vec<&str> {
        self.children(id).iter().map(|&c| self.name(c)).collect()
    }

    /// The tasks declared at the top level of the configuration.
    pub fn top_level(&self) -> &[NodeId] {
        self.children(self.root)
    }

    pub fn graph(&self) -> &DepGraph {
        &self.graph
    }

    pub fn descendants(&self, id: NodeId) -> HashSet<NodeId> {
        self.graph.descendants(id)
    }

    /// Dependency order for `id`, optionally cut after `stop_at`.
    pub fn resolve(&self, id: NodeId, stop_at: Option<&str>) -> Result<Vec<NodeId>> {
        self.graph.resolve_until(id, stop_at)
    }

    /// A copy of the graph with redundant edges below `id` removed.
    ///
    /// The tree itself keeps every declared edge so execution order is never
    /// affected by reporting.
    pub fn reduced(&self, id: NodeId) -> Result<DepGraph> {
        let mut graph = self.graph.clone();
        graph.reduce(id)?;
        Ok(graph)
    }

    /// Force `id` to be skipped (or not) for this run, optionally with every
    /// task below it.
    pub fn mark_skip(&mut self, id: NodeId, skip: bool, recursive: bool) {
        self.tasks[id].forced = skip;
        if recursive {
            for child in self.graph.descendants(id) {
                trace!(task = %self.tasks[child].name, skip, "forcing skip on descendant");
                self.tasks[child].forced = skip;
            }
        }
    }

    pub fn is_forced(&self, id: NodeId) -> bool {
        self.tasks[id].forced
    }

    /// Clear every forced flag. Called at the start of each invocation.
    pub fn reset_forced(&mut self) {
        for task in &mut self.tasks {
            task.forced = false;
        }
    }
}

/// A child position recorded during the first phase.
#[derive(Debug)]
enum Slot {
    Built(NodeId),
    Pending(String),
}

#[derive(Debug, Default)]
struct TreeBuilder {
    graph: DepGraph,
    tasks: Vec<Task>,
    index: HashMap<String, NodeId>,
    slots: Vec<(NodeId, Vec<Slot>)>,
}

impl TreeBuilder {
    fn insert(&mut self, def: &TaskDefinition) -> Result<NodeId> {
        if self.index.contains_key(&def.name) {
            return Err(TycheError::DuplicateTask(def.name.clone()));
        }

        let id = self.graph.add_node(def.name.clone());
        self.tasks.push(if def.name == ROOT_TASK_NAME {
            Task::root()
        } else {
            Task::from_definition(def)
        });
        self.index.insert(def.name.clone(), id);

        let mut slots: Vec<Slot> = def
            .dependencies
            .iter()
            .map(|name| Slot::Pending(name.clone()))
            .collect();

        for entry in &def.tasks {
            match entry {
                TaskEntry::Name(name) => slots.push(Slot::Pending(name.clone())),
                TaskEntry::Definition(child) => slots.push(Slot::Built(self.insert(child)?)),
            }
        }

        self.slots.push((id, slots));
        Ok(id)
    }

    fn link(mut self, root: NodeId) -> Result<TaskTree> {
        let mut missing: Vec<String> = Vec::new();

        for (id, slots) in std::mem::take(&mut self.slots) {
            for slot in slots {
                match slot {
                    Slot::Built(child) => self.graph.add_edge(id, child),
                    Slot::Pending(name) => match self.index.get(&name) {
                        Some(&target) => {
                            trace!(from = %self.tasks[id].name, to = %name, "resolved reference");
                            self.graph.add_edge(id, target);
                        }
                        None => {
                            if !missing.contains(&name) {
                                missing.push(name);
                            }
                        }
                    },
                }
            }
        }

        if !missing.is_empty() {
            return Err(TycheError::UnresolvedDependency(missing));
        }

        // Rejects cycles introduced through references.
        self.graph.resolve(root)?;

        Ok(TaskTree {
            graph: self.graph,
            tasks: self.tasks,
            root,
        })
    }
}

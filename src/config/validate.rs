// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use crate::config::model::{ConfigFile, RawConfigFile, TaskDefinition, TaskEntry};
use crate::errors::{Result, TycheError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TycheError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.tasks))
    }
}

/// Run every load-time check on a raw configuration.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;

    let all = collect_definitions(&cfg.tasks);
    validate_unique_names(&all)?;
    validate_references(&all)?;
    validate_dag(&all)?;
    Ok(())
}

/// Flatten nested definitions, depth-first in declaration order.
pub(crate) fn collect_definitions(tasks: &[TaskDefinition]) -> Vec<&TaskDefinition> {
    fn walk<'a>(def: &'a TaskDefinition, out: &mut Vec<&'a TaskDefinition>) {
        out.push(def);
        for entry in &def.tasks {
            if let TaskEntry::Definition(child) = entry {
                walk(child, out);
            }
        }
    }

    let mut out = Vec::new();
    for def in tasks {
        walk(def, &mut out);
    }
    out
}

/// Names a definition points at: named dependencies, nested children and
/// bare-name children.
fn referenced_names(def: &TaskDefinition) -> impl Iterator<Item = &str> {
    def.dependencies
        .iter()
        .map(String::as_str)
        .chain(def.tasks.iter().map(|entry| match entry {
            TaskEntry::Name(name) => name.as_str(),
            TaskEntry::Definition(child) => child.name.as_str(),
        }))
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.tasks.is_empty() {
        return Err(TycheError::ConfigError(
            "config must contain at least one [[tasks]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if let Some(tool) = &cfg.config.default_tool {
        if tool.trim().is_empty() {
            return Err(TycheError::ConfigError(
                "[config].default_tool must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_unique_names(all: &[&TaskDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for def in all {
        if def.name.trim().is_empty() {
            return Err(TycheError::ConfigError(
                "every task needs a non-empty `name`".to_string(),
            ));
        }
        if !seen.insert(def.name.as_str()) {
            return Err(TycheError::DuplicateTask(def.name.clone()));
        }
    }
    Ok(())
}

fn validate_references(all: &[&TaskDefinition]) -> Result<()> {
    let known: HashSet<&str> = all.iter().map(|d| d.name.as_str()).collect();

    let mut missing: Vec<String> = Vec::new();
    for def in all {
        for name in referenced_names(def) {
            if !known.contains(name) && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(TycheError::UnresolvedDependency(missing))
    }
}

fn validate_dag(all: &[&TaskDefinition]) -> Result<()> {
    // Edge direction: task -> whatever it depends on.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for def in all {
        graph.add_node(def.name.as_str());
    }

    for def in all {
        for name in referenced_names(def) {
            graph.add_edge(def.name.as_str(), name, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            // Find the edge that closes the loop back onto `node`.
            let from = graph
                .neighbors_directed(node, Direction::Incoming)
                .find(|&pred| has_path_connecting(&graph, node, pred, None))
                .unwrap_or(node);
            Err(TycheError::CircularDependency {
                from: from.to_string(),
                to: node.to_string(),
            })
        }
    }
}

// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Construction errors (duplicate names, unresolved references, cycles) are
//! raised while a task tree is built; execution errors abort a running build.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TycheError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("state file error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Duplicate task name found: {0}")]
    DuplicateTask(String),

    #[error("unresolved dependency: {}", .0.join(", "))]
    UnresolvedDependency(Vec<String>),

    #[error("Circular dependency detected: {from} -> {to}")]
    CircularDependency { from: String, to: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Command not initialized for tool '{0}'")]
    UninitializedCommand(String),

    #[error("no compatible tool for task '{task}' (tool: {tool})")]
    NoCompatibleTool { task: String, tool: String },

    #[error("task '{task}' failed with exit code {code}")]
    BuildFailed { task: String, code: i32 },

    #[error("task '{task}' could not launch '{program}': {reason}")]
    LaunchFailed {
        task: String,
        program: String,
        reason: String,
    },

    #[error("build interrupted at task '{0}'")]
    Interrupted(String),

    #[error("build state store has not been initialized")]
    StoreNotInitialized,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TycheError>;

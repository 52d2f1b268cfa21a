// src/config/mod.rs

//! Configuration loading and validation for tyche.
//!
//! Responsibilities:
//! - Define the TOML-backed task definition model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate load-time invariants: unique names, known references,
//!   acyclic dependencies (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    ConfigFile, ConfigSection, Constraints, ExecMap, RawConfigFile, ServiceSelection, SkipRules,
    StepDefinition, TaskDefinition, TaskEntry,
};
pub use validate::validate_config;

// src/dag/mod.rs

//! Dependency graph primitives.
//!
//! - [`graph`] holds the arena graph and depth-first resolution.
//! - [`reduce`] implements transitive reduction.

pub mod graph;
pub mod reduce;

pub use graph::{DepGraph, NodeId};

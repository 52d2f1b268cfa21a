// src/task/mod.rs

//! Resolved task tree and the skip policy evaluated against it.

pub mod skip;
pub mod tree;

pub use skip::{SkipPolicy, SkipVotes};
pub use tree::{ROOT_TASK_NAME, Task, TaskTree};

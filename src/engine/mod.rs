// src/engine/mod.rs

//! Build engine.
//!
//! A [`BuildSession`] walks the resolved order of a target task,
//! dependencies first, and for each task:
//! - builds the step for the effective tool and renders its command line,
//! - asks the skip policy whether it may be skipped,
//! - in execute mode, runs it and records the result in the build state,
//! - publishes a completion event.
//!
//! The dry protocol does everything except launching processes and writing
//! state.

pub mod interrupt;
pub mod session;

use std::path::PathBuf;

pub use interrupt::InterruptGuard;
pub use session::BuildSession;

/// Environment variable carrying the current build number.
pub const BUILD_NUMBER_ENV: &str = "BUILD_NUMBER";

/// Whether a session launches processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Execute,
    Dry,
}

/// What happened to one task during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub name: String,
    /// Rendered command line, if the task has a step for the effective tool.
    pub exec: Option<String>,
    /// Exit code, when a process actually ran.
    pub result: Option<i32>,
    pub skipped: bool,
}

/// Per-invocation settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Directory step paths and skip paths are resolved against.
    pub workdir: PathBuf,
    /// Arguments forwarded to steps with `accepts_args`.
    pub passthrough_args: Vec<String>,
    /// Let child processes write to the terminal.
    pub show_output: bool,
    /// Source revision stored in run history.
    pub revision: Option<String>,
    /// Config file the tree was loaded from. Tasks that watch files also
    /// watch this one, so editing the config invalidates their skips.
    pub config_file: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            passthrough_args: Vec::new(),
            show_output: true,
            revision: None,
            config_file: None,
        }
    }
}

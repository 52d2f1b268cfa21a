// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `tyche`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tyche",
    version,
    about = "Build a tree of tasks, skipping the ones that are already done.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `tyche.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "tyche.toml")]
    pub config: String,

    /// Task to build. Without one, every top-level task is built.
    #[arg(value_name = "TASK")]
    pub task: Option<String>,

    /// Preferred tool (`native`, `compose`). Defaults to `[config].default_tool`.
    #[arg(long, value_name = "TOOL")]
    pub tool: Option<String>,

    /// Stop after this task has been handled.
    #[arg(long, value_name = "NAME")]
    pub stop_at: Option<String>,

    /// Print the commands a build would run, without running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Build state file. Overrides `[config].state_file`.
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<String>,

    /// Keep child process output off the terminal (it goes to the debug log).
    #[arg(long)]
    pub quiet: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TYCHE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Arguments after `--`, forwarded to steps with `accepts_args`.
    #[arg(last = true, value_name = "ARGS")]
    pub passthrough: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

// src/lib.rs

pub mod bus;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod state;
pub mod task;
pub mod tool;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::bus::EventBus;
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::engine::{BuildSession, SessionOptions, TaskReport};
use crate::state::{BuildState, RepoContext};
use crate::task::{ROOT_TASK_NAME, TaskTree};
use crate::tool::ToolRegistry;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and task tree construction
/// - the build state store for the current repository
/// - the event bus and tool registry
/// - a build session running (or previewing) the requested target
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let registry = ToolRegistry::default();
    let tool = args
        .tool
        .clone()
        .unwrap_or_else(|| cfg.config.effective_default_tool().to_string());

    let mut tree = TaskTree::from_config(&cfg)?;
    let target = args.task.clone().unwrap_or_else(|| ROOT_TASK_NAME.to_string());

    // Canonical so snapshot keys and step directories do not depend on how
    // `--config` was spelled.
    let workdir = tokio::fs::canonicalize(config_root_dir(&config_path))
        .await
        .with_context(|| format!("resolving directory of {:?}", config_path))?;
    let config_file = tokio::fs::canonicalize(&config_path)
        .await
        .with_context(|| format!("resolving {:?}", config_path))?;
    let repo = RepoContext::discover(&workdir).await;

    let state_path = args
        .state_file
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| cfg.config.state_file.clone())
        .unwrap_or_else(BuildState::default_path);
    let mut state = BuildState::open(state_path, repo.prefix()).await?;

    let bus = EventBus::default();
    let options = SessionOptions {
        workdir,
        passthrough_args: args.passthrough.clone(),
        show_output: !args.quiet,
        revision: repo.head_revision().await,
        config_file: Some(config_file),
    };
    debug!(?options, "session options");

    let reports = {
        let mut session = BuildSession::new(&mut tree, &mut state, &bus, &registry, options);
        match (args.dry_run, args.stop_at.as_deref()) {
            (true, None) => session.dry(&target, &tool).await?,
            (true, Some(stop)) => session.dry_until(&target, &tool, stop).await?,
            (false, None) => session.execute(&target, &tool).await?,
            (false, Some(stop)) => session.execute_until(&target, &tool, stop).await?,
        }
    };

    if args.dry_run {
        print!("{}", render_dry_run(&tree, &target, &tool, &reports)?);
    } else {
        print_summary(&reports);
    }

    state.finish().await?;
    info!("done");
    Ok(())
}

/// Directory of the config file, or the current directory for a bare name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn visible(reports: &[TaskReport]) -> impl Iterator<Item = &TaskReport> {
    reports.iter().filter(|r| r.name != ROOT_TASK_NAME)
}

/// Shell-script preview of a build.
///
/// Commands a real run would skip are commented out.
pub fn render_dry_run(
    tree: &TaskTree,
    target: &str,
    tool: &str,
    reports: &[TaskReport],
) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "#!/bin/sh")?;
    writeln!(out, "# tyche dry run of '{target}' with tool '{tool}'")?;
    writeln!(out, "set -e")?;

    let start = tree.require(target)?;
    let reduced = tree.reduced(start)?;
    writeln!(out)?;
    for report in visible(reports) {
        if let Some(id) = tree.find(&report.name) {
            let children: Vec<&str> = reduced.edges(id).iter().map(|&c| reduced.name(c)).collect();
            if !children.is_empty() {
                writeln!(out, "# {} <- {}", report.name, children.join(", "))?;
            }
        }
    }

    for report in visible(reports) {
        let Some(exec) = &report.exec else {
            continue;
        };
        writeln!(out)?;
        if report.skipped {
            writeln!(out, "# {} (skipped)", report.name)?;
            writeln!(out, "# {exec}")?;
        } else {
            writeln!(out, "# {}", report.name)?;
            writeln!(out, "{exec}")?;
        }
    }

    Ok(out)
}

fn print_summary(reports: &[TaskReport]) {
    println!("tyche build summary:");
    for report in visible(reports) {
        let status = match (report.skipped, report.result) {
            (true, _) => "skipped".to_string(),
            (false, Some(code)) => format!("ok (exit {code})"),
            (false, None) => "-".to_string(),
        };
        println!("  {:<24} {}", report.name, status);
    }
}

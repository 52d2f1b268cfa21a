// src/tool/command.rs

//! A fully prepared subprocess invocation and the code that runs it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info};

/// Exit code reported when a process cannot be launched at all.
pub const LAUNCH_FAILURE_CODE: i32 = 127;

/// Result of one subprocess run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    pub code: i32,
    /// Set when the process never started (binary missing, not executable).
    /// `code` is then [`LAUNCH_FAILURE_CODE`].
    pub launch_error: Option<String>,
}

impl ExecOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            code,
            launch_error: None,
        }
    }

    pub fn launch_failed(reason: impl Into<String>) -> Self {
        Self {
            code: LAUNCH_FAILURE_CODE,
            launch_error: Some(reason.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.launch_error.is_none() && self.code == 0
    }
}

/// Program, arguments, working directory and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl PreparedCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    /// `program args...` without the environment.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `KEY=value ... program args...` as a single line.
    ///
    /// Numeric values are written bare, everything else is double-quoted.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(key, value)| {
                if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                    format!("{key}={value}")
                } else {
                    format!("{key}=\"{value}\"")
                }
            })
            .collect();
        parts.push(self.command_line());
        parts.join(" ")
    }

    /// Spawn the process and wait for it.
    ///
    /// With `show_output` the child inherits the terminal. Otherwise stdin is
    /// closed and output is drained into the debug log. A spawn failure is
    /// folded into [`ExecOutcome::launch_failed`] instead of an error.
    pub async fn run(&self, show_output: bool) -> ExecOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env).kill_on_drop(true);

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        if show_output {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }

        info!(cmd = %self.command_line(), "starting process");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(program = %self.program, error = %e, "failed to launch process");
                return ExecOutcome::launch_failed(e.to_string());
            }
        };

        let drains: Vec<_> = [
            child.stdout.take().map(|s| drain_lines(self.program.clone(), "stdout", s)),
            child.stderr.take().map(|s| drain_lines(self.program.clone(), "stderr", s)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let outcome = match child.wait().await {
            Ok(status) => {
                let code = status.code().unwrap_or(-1);
                info!(
                    program = %self.program,
                    exit_code = code,
                    success = status.success(),
                    "process exited"
                );
                ExecOutcome::exited(code)
            }
            Err(e) => {
                error!(program = %self.program, error = %e, "waiting for process failed");
                ExecOutcome::exited(-1)
            }
        };

        for drain in drains {
            let _ = drain.await;
        }

        outcome
    }
}

fn drain_lines<R>(program: String, stream: &'static str, reader: R) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(program = %program, stream, "{}", line);
        }
    })
}

//! Process execution: tool resolution, spawning, output streaming.
//!
//! `ProcessRunner` is the seam between orchestration and the operating system.
//! `SystemRunner` spawns real processes; `RecordingRunner` records invocations without
//! running anything (dry runs and tests).
//!
//! Tool output is forwarded line by line through the `log` facade under the `tool` target,
//! so the log collector persists it alongside the driver's own messages.

use crate::error::BuildError;
use crate::models::{ExecutionResult, ToolInvocation};
use crate::system::Environment;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Log target for lines produced by external tools.
pub const TOOL_LOG_TARGET: &str = "tool";

/// Runs tool invocations, one at a time.
pub trait ProcessRunner {
    /// Run one invocation with a fully composed environment and wait for it to exit.
    ///
    /// A non-zero exit is reported through `ExecutionResult::success`, not as an error.
    fn run(&mut self, invocation: &ToolInvocation, env: &Environment) -> Result<ExecutionResult, BuildError>;

    /// Locate an executable, by explicit path or by searching `PATH`.
    fn resolve(&self, program: &Path) -> Option<PathBuf>;
}

/// Programs given with a directory component are checked directly; bare names are searched.
///
/// The result is always absolute, so it stays valid after the child changes directory.
pub fn resolve_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        if !program.is_file() {
            return None;
        }
        return std::path::absolute(program).ok();
    }
    which::which(program).ok()
}

/// Spawns real processes.
pub struct SystemRunner {
    runtime: tokio::runtime::Runtime,
}

impl SystemRunner {
    pub fn new() -> Result<Self, BuildError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;
        Ok(SystemRunner { runtime })
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&mut self, invocation: &ToolInvocation, env: &Environment) -> Result<ExecutionResult, BuildError> {
        let command_line = invocation.command_line();
        let program = self
            .resolve(&invocation.program)
            .ok_or_else(|| BuildError::ToolNotFound {
                program: invocation.program.to_string_lossy().into_owned(),
                command: command_line.clone(),
            })?;

        log::info!("[Exec] {}", command_line);
        if let Some(cwd) = &invocation.cwd {
            log::debug!("[Exec] cwd: {}", cwd.display());
        }

        let mut command = Command::new(&program);
        command
            .args(&invocation.args)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let capture = invocation.capture_output;
        let outcome = self.runtime.block_on(async {
            let run = stream_to_exit(command, capture, &command_line);
            match invocation.timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(result) => result,
                    Err(_) => Err(BuildError::TimedOut {
                        command: command_line.clone(),
                        seconds: limit.as_secs(),
                    }),
                },
                None => run.await,
            }
        })?;

        let (status, output) = outcome;
        if !status.success() {
            log::error!("[Exec] Failed ({}): {}", describe_status(&status), command_line);
        }
        Ok(ExecutionResult {
            invocation: invocation.clone(),
            success: status.success(),
            exit_code: status.code(),
            output,
        })
    }

    fn resolve(&self, program: &Path) -> Option<PathBuf> {
        resolve_executable(program)
    }
}

/// Spawn, forward both output streams until they close, then wait for exit.
///
/// Dropping the future (timeout) kills the child.
async fn stream_to_exit(
    mut command: Command,
    capture: bool,
    command_line: &str,
) -> Result<(std::process::ExitStatus, Option<String>), BuildError> {
    let mut child = command.spawn().map_err(|e| BuildError::SpawnFailed {
        command: command_line.to_string(),
        reason: e.to_string(),
    })?;

    let stdout = child.stdout.take().ok_or_else(|| BuildError::SpawnFailed {
        command: command_line.to_string(),
        reason: "stdout was not captured".to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| BuildError::SpawnFailed {
        command: command_line.to_string(),
        reason: "stderr was not captured".to_string(),
    })?;

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut stdout_closed = false;
    let mut stderr_closed = false;
    let mut captured = String::new();

    while !(stdout_closed && stderr_closed) {
        tokio::select! {
            line = stdout_lines.next_line(), if !stdout_closed => match line {
                Ok(Some(line)) => {
                    log::info!(target: TOOL_LOG_TARGET, "{}", line);
                    if capture {
                        captured.push_str(&line);
                        captured.push('\n');
                    }
                }
                Ok(None) => stdout_closed = true,
                Err(e) => {
                    log::warn!("[Exec] stdout read error: {}", e);
                    stdout_closed = true;
                }
            },
            line = stderr_lines.next_line(), if !stderr_closed => match line {
                Ok(Some(line)) => log::info!(target: TOOL_LOG_TARGET, "{}", line),
                Ok(None) => stderr_closed = true,
                Err(e) => {
                    log::warn!("[Exec] stderr read error: {}", e);
                    stderr_closed = true;
                }
            },
        }
    }

    let status = child.wait().await?;
    Ok((status, capture.then_some(captured)))
}

fn describe_status(status: &std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// One invocation seen by the `RecordingRunner`, with the environment it was given.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub invocation: ToolInvocation,
    pub env: Environment,
}

type FailurePredicate = Box<dyn Fn(&ToolInvocation) -> bool>;

/// Records invocations instead of running them.
///
/// Every invocation succeeds unless it matches the failure predicate. Programs listed with
/// `missing` do not resolve.
#[derive(Default)]
pub struct RecordingRunner {
    pub recorded: Vec<RecordedInvocation>,
    fail_when: Option<FailurePredicate>,
    missing: Vec<PathBuf>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        RecordingRunner::default()
    }

    /// Make matching invocations exit with code 1.
    pub fn fail_when(mut self, predicate: impl Fn(&ToolInvocation) -> bool + 'static) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Treat `program` as not installed.
    pub fn missing(mut self, program: impl Into<PathBuf>) -> Self {
        self.missing.push(program.into());
        self
    }

    pub fn invocations(&self) -> Vec<&ToolInvocation> {
        self.recorded.iter().map(|r| &r.invocation).collect()
    }

    /// Shell-quoted command lines in execution order.
    pub fn command_lines(&self) -> Vec<String> {
        self.recorded
            .iter()
            .map(|r| r.invocation.command_line())
            .collect()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&mut self, invocation: &ToolInvocation, env: &Environment) -> Result<ExecutionResult, BuildError> {
        if self.resolve(&invocation.program).is_none() {
            return Err(BuildError::ToolNotFound {
                program: invocation.program.to_string_lossy().into_owned(),
                command: invocation.command_line(),
            });
        }

        log::info!("[Exec] (dry run) {}", invocation.command_line());
        self.recorded.push(RecordedInvocation {
            invocation: invocation.clone(),
            env: env.clone(),
        });

        let failed = self.fail_when.as_ref().map_or(false, |f| f(invocation));
        if failed {
            return Ok(ExecutionResult {
                invocation: invocation.clone(),
                success: false,
                exit_code: Some(1),
                output: None,
            });
        }
        Ok(ExecutionResult::succeeded(
            invocation.clone(),
            invocation.capture_output.then(String::new),
        ))
    }

    fn resolve(&self, program: &Path) -> Option<PathBuf> {
        (!self.missing.iter().any(|m| m == program)).then(|| program.to_path_buf())
    }
}

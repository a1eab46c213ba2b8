//! Subprocess execution
//!
//! All external tools (git, docker-compose) are started through the
//! [`CommandRunner`] seam. [`ProcessRunner`] is the real implementation:
//! stdio is inherited from the hook so output streams straight back to
//! the pushing client.
//!
//! Bounded runs (`timeout: Some(d)`) race the child's exit against a
//! timer. When the timer wins the child gets SIGTERM, never SIGKILL, and
//! the call still waits for it to exit. docker-compose forwards SIGTERM
//! to the processes it spawned; a tool that does not would leave them
//! running. Reaching the deadline is the normal end of a bounded run and
//! is reported as success.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::ProcessError;

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
    /// Added to the inherited environment
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, current_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: current_dir.into(),
            envs: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs<I>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.envs.extend(envs);
        self
    }

    /// Command line as logged, `program arg1 arg2`
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Starts external commands and waits for them
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` to completion, or for at most `timeout` when given.
    async fn run(&self, cmd: &CommandSpec, timeout: Option<Duration>) -> Result<(), ProcessError>;
}

/// Runs commands as real child processes with inherited stdio
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, cmd: &CommandSpec, timeout: Option<Duration>) -> Result<(), ProcessError> {
        let command_line = cmd.display();
        info!("{}", command_line);

        let child = Command::new(&cmd.program)
            .args(&cmd.args)
            .current_dir(&cmd.current_dir)
            .envs(cmd.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        wait_with_deadline(child, &command_line, timeout).await
    }
}

/// Wait for `child`, sending SIGTERM once `timeout` elapses.
///
/// The exit future is created once and awaited to completion on both
/// paths, so no waiter outlives the call.
pub async fn wait_with_deadline(
    mut child: Child,
    command: &str,
    timeout: Option<Duration>,
) -> Result<(), ProcessError> {
    let timeout = match timeout.filter(|t| !t.is_zero()) {
        Some(timeout) => timeout,
        None => return check_status(command, child.wait().await),
    };

    let pid = child.id();
    let exit = child.wait();
    tokio::pin!(exit);

    tokio::select! {
        status = &mut exit => check_status(command, status),
        _ = tokio::time::sleep(timeout) => {
            debug!("`{}` reached {} limit, terminating", command, humantime::format_duration(timeout));
            request_stop(pid, command);
            match exit.await {
                Ok(status) => debug!("`{}` stopped: {}", command, status),
                Err(e) => warn!("`{}` did not report its exit: {}", command, e),
            }
            Ok(())
        }
    }
}

fn check_status(
    command: &str,
    status: std::io::Result<ExitStatus>,
) -> Result<(), ProcessError> {
    let status = status.map_err(|source| ProcessError::Wait {
        command: command.to_string(),
        source,
    })?;

    if !status.success() {
        return Err(ProcessError::Exit {
            command: command.to_string(),
            status,
        });
    }
    Ok(())
}

#[cfg(unix)]
fn request_stop(pid: Option<u32>, command: &str) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        // already reaped
        return;
    };

    #[allow(clippy::cast_possible_wrap)]
    let target = Pid::from_raw(pid as i32);
    if let Err(e) = kill(target, Signal::SIGTERM) {
        warn!("failed to send SIGTERM to `{}` ({}): {}", command, pid, e);
    }
}

#[cfg(not(unix))]
fn request_stop(_pid: Option<u32>, command: &str) {
    warn!("graceful stop unsupported on this platform, waiting for `{}`", command);
}

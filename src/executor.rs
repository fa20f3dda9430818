//! Execution adapter
//!
//! Hands an assembled command to a process-execution collaborator and
//! captures exit code, stdout and stderr. A non-zero exit code is data, not
//! an error: only failing to run the command at all is an `ExecutionError`.

use crate::assembler::AssembledCommand;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured outcome of one process run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The command could not be run (as opposed to running and failing)
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("working directory '{}' does not exist", path.display())]
    MissingWorkingDir { path: PathBuf },

    #[error("failed to start '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("failed while waiting for command: {0}")]
    Wait(#[source] std::io::Error),
}

/// Synchronous process-execution collaborator
pub trait ProcessExecutor: Send + Sync {
    /// Run `command` in `working_dir` and block until it finishes
    fn execute(
        &self,
        command: &AssembledCommand,
        working_dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<ExecutionResult, ExecutionError>;
}

/// Runs commands through `sh -c`, so pipes and redirection work
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    timeout: Option<Duration>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            timeout: None,
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different shell binary (must accept `-c`)
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Kill the command if it runs longer than this
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl ProcessExecutor for ShellExecutor {
    #[instrument(skip(self, env), fields(shell = %self.shell))]
    fn execute(
        &self,
        command: &AssembledCommand,
        working_dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<ExecutionResult, ExecutionError> {
        if !working_dir.is_dir() {
            return Err(ExecutionError::MissingWorkingDir {
                path: working_dir.to_path_buf(),
            });
        }

        let mut shell = Command::new(&self.shell);
        shell
            .arg("-c")
            .arg(command.as_str())
            .current_dir(working_dir)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a timeout can take down every pipeline stage
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            shell.process_group(0);
        }
        let mut child = shell
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                shell: self.shell.clone(),
                source,
            })?;

        // Drain both pipes concurrently so a chatty tool cannot block on a full pipe
        let stdout = child.stdout.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let status = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout).map_err(ExecutionError::Wait)? {
                Some(status) => status,
                None => {
                    kill_process_group(child.id());
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(?timeout, "command timed out");
                    return Err(ExecutionError::Timeout { timeout });
                }
            },
            None => child.wait().map_err(ExecutionError::Wait)?,
        };

        let collect = |handle: Option<thread::JoinHandle<Vec<u8>>>| {
            handle
                .and_then(|h| h.join().ok())
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        };

        // Killed by a signal: no exit code
        let exit_code = status.code().unwrap_or(-1);
        debug!(exit_code, "command finished");

        Ok(ExecutionResult {
            exit_code,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

/// SIGKILL the group led by `pgid`
fn kill_process_group(pgid: u32) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .arg("-KILL")
            .arg("--")
            .arg(format!("-{}", pgid))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }

    #[cfg(not(unix))]
    {
        let _ = pgid;
    }
}

//! Execution result types.

use std::path::PathBuf;
use std::process::{Child, ExitStatus};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::command::TeeBackend;
use super::process_group;
use crate::error::CmdError;
use crate::Result;

/// Result of a completed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmdOutput {
    /// Display text of the command that ran.
    pub command: String,
    /// Captured standard output (combined output under the pty backend).
    pub stdout: Option<String>,
    /// Captured standard error.
    pub stderr: Option<String>,
    /// Exit code; a signal death on Unix is reported as `-signal`.
    pub exit_code: i32,
    /// Working directory override, if any.
    pub cwd: Option<PathBuf>,
    /// Time from spawn to reap.
    pub duration: Duration,
    /// Backend that drained the output.
    pub backend: TeeBackend,
}

impl CmdOutput {
    /// Create an empty result for the given command.
    pub fn new(command: impl Into<String>, backend: TeeBackend) -> Self {
        Self {
            command: command.into(),
            stdout: None,
            stderr: None,
            exit_code: 0,
            cwd: None,
            duration: Duration::ZERO,
            backend,
        }
    }

    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if the command failed.
    pub fn failed(&self) -> bool {
        !self.success()
    }

    /// Turn a non-zero exit code into a `NonZeroExit` error.
    pub fn check_returncode(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(CmdError::NonZeroExit(Box::new(self)))
        }
    }

    /// Standard output as a string, empty when not captured.
    pub fn stdout_str(&self) -> &str {
        self.stdout.as_deref().unwrap_or("")
    }

    /// Standard error as a string, empty when not captured.
    pub fn stderr_str(&self) -> &str {
        self.stderr.as_deref().unwrap_or("")
    }

    /// Get output as string, trimmed.
    pub fn output_trimmed(&self) -> &str {
        self.stdout_str().trim()
    }

    /// Get output lines.
    pub fn output_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout_str().lines()
    }
}

/// Outcome of [`crate::cmd`].
#[derive(Debug)]
pub enum Outcome {
    /// The command ran to completion.
    Completed(CmdOutput),
    /// The command was launched and left running.
    Detached(DetachedProcess),
}

impl Outcome {
    /// The completed result, or an error if the command was detached.
    pub fn into_output(self) -> Result<CmdOutput> {
        match self {
            Self::Completed(output) => Ok(output),
            Self::Detached(process) => Err(CmdError::InvalidArgument(format!(
                "command `{}` was detached and has no result",
                process.command()
            ))),
        }
    }

    /// The detached handle, if any.
    pub fn into_detached(self) -> Option<DetachedProcess> {
        match self {
            Self::Detached(process) => Some(process),
            Self::Completed(_) => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Detached(_))
    }
}

/// Handle to a process launched with `detach`.
///
/// Dropping the handle leaves the process running.
#[derive(Debug)]
pub struct DetachedProcess {
    child: Child,
    command: String,
}

impl DetachedProcess {
    pub(crate) fn new(child: Child, command: String) -> Self {
        Self { child, command }
    }

    /// Process ID of the child.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Display text of the command.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Poll for the exit code without blocking.
    pub fn try_wait(&mut self) -> Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(exit_code_of))
    }

    /// Block until the process exits.
    pub fn wait(&mut self) -> Result<i32> {
        Ok(exit_code_of(self.child.wait()?))
    }

    /// Kill the process and its process group, then reap it.
    pub fn kill(&mut self) -> Result<()> {
        process_group::kill_tree(&mut self.child);
        self.child.wait()?;
        Ok(())
    }
}

/// Map an exit status to a single code.
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Streaming output chunk from execution.
#[derive(Debug, Clone)]
pub struct OutputChunk {
    /// Raw bytes.
    pub raw: Vec<u8>,
    /// Stream source.
    pub source: OutputSource,
}

/// Source of output data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
    /// Combined output (pseudo-terminal).
    Combined,
}

impl OutputChunk {
    /// Create a new output chunk.
    pub fn new(raw: Vec<u8>, source: OutputSource) -> Self {
        Self { raw, source }
    }

    pub fn stdout(raw: Vec<u8>) -> Self {
        Self::new(raw, OutputSource::Stdout)
    }

    pub fn stderr(raw: Vec<u8>) -> Self {
        Self::new(raw, OutputSource::Stderr)
    }
}

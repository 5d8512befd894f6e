//! Error types for shell-cmd.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::execution::CmdOutput;

/// Main error type for command execution.
#[derive(Error, Debug)]
pub enum CmdError {
    /// The program could not be found or is not executable.
    #[error("command not found: {0}")]
    CommandNotFound(String),

    /// The requested working directory does not exist or is not a directory.
    #[error("invalid working directory: {}", .0.display())]
    InvalidWorkingDirectory(PathBuf),

    /// The invocation was rejected before spawning.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The process outlived its deadline and was killed.
    #[error("command `{command}` timed out after {timeout:?}")]
    Timeout {
        command: String,
        timeout: Duration,
        /// Output captured before the kill.
        stdout: String,
        /// Error output captured before the kill.
        stderr: String,
    },

    /// The process exited non-zero and the invocation asked for a check.
    #[error("command `{}` exited with code {}", .0.command, .0.exit_code)]
    NonZeroExit(Box<CmdOutput>),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// PTY-related error.
    #[error("PTY error: {0}")]
    Pty(String),

    /// The async runtime could not be built or a task failed.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl CmdError {
    /// The result attached to a `NonZeroExit`, if any.
    pub fn output(&self) -> Option<&CmdOutput> {
        match self {
            Self::NonZeroExit(output) => Some(output),
            _ => None,
        }
    }

    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Convenience Result type for shell-cmd operations.
pub type Result<T> = std::result::Result<T, CmdError>;

//! Invocation checks performed before anything is spawned.

use std::path::Path;
use std::time::Duration;

use super::command::{CommandSpec, Invocation};
use crate::error::CmdError;
use crate::Result;

/// Longest command text kept in log lines.
const MAX_DISPLAY_CHARS: usize = 1000;

/// Validate every field of an invocation.
pub fn validate(invocation: &Invocation) -> Result<()> {
    validate_command(&invocation.command)?;
    if let Some(timeout) = invocation.timeout {
        validate_timeout(timeout)?;
    }
    if let Some(ref cwd) = invocation.cwd {
        validate_working_dir(cwd)?;
    }
    if let Some(ref env) = invocation.env {
        for (key, value) in env {
            if key.is_empty() || key.contains('=') || key.contains('\0') || value.contains('\0') {
                return Err(CmdError::InvalidArgument(format!(
                    "invalid environment variable: {key:?}"
                )));
            }
        }
    }
    Ok(())
}

/// Validate the command itself.
pub fn validate_command(command: &CommandSpec) -> Result<()> {
    if command.is_empty() {
        return Err(CmdError::InvalidArgument("command cannot be empty".into()));
    }

    match command {
        CommandSpec::Shell(line) => {
            if line.contains('\0') {
                return Err(nul_byte());
            }
        }
        CommandSpec::Argv(argv) => {
            if argv[0].is_empty() {
                return Err(CmdError::InvalidArgument("program name cannot be empty".into()));
            }
            if argv.iter().any(|arg| arg.contains('\0')) {
                return Err(nul_byte());
            }
        }
    }

    Ok(())
}

/// A timeout must be a positive duration.
pub fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(CmdError::InvalidArgument("timeout must be positive".into()));
    }
    Ok(())
}

/// The working directory must exist and be a directory.
pub fn validate_working_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(CmdError::InvalidWorkingDirectory(path.to_path_buf()));
    }
    Ok(())
}

/// Command text safe to put in a log line.
pub fn sanitize_for_display(command: &str) -> String {
    command
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .take(MAX_DISPLAY_CHARS)
        .collect()
}

fn nul_byte() -> CmdError {
    CmdError::InvalidArgument("command contains a NUL byte".into())
}

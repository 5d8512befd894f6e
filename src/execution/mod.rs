//! Command execution engine.
//!
//! This module provides command execution capabilities:
//! - Direct (argv) and shell execution
//! - Live output tee through thread, tokio or pty backends
//! - Timeout handling with process-group kills
//! - Detached and system-style runs
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use shell_cmd::execution::{cmd, Invocation};
//!
//! let output = cmd(&Invocation::new("echo hello").shell(true))?.into_output()?;
//! assert_eq!(output.stdout_str(), "hello\n");
//!
//! let inv = Invocation::new(["cargo", "build"])
//!     .cwd("/project")
//!     .timeout(Duration::from_secs(600))
//!     .verbose(1)
//!     .check(true);
//! cmd(&inv)?;
//! # Ok::<(), shell_cmd::CmdError>(())
//! ```

mod backend;
mod command;
mod executor;
mod process_group;
pub mod quoting;
mod result;
pub mod validation;

pub use command::{CommandSpec, Invocation, TeeBackend, TeePolicy};
pub use executor::{cmd, cmd_async, cmd_with_sink, execute_simple, execute_streaming};
pub use result::{CmdOutput, DetachedProcess, Outcome, OutputChunk, OutputSource};

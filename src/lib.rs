//! # shell-cmd
//!
//! Run external commands with captured output, optional live echo, timeouts
//! and detached launches.
//!
//! One call covers the common cases: run a program or a shell line, collect
//! its stdout, stderr and exit code, and optionally mirror the output to the
//! caller's terminal while it is captured.
//!
//! ## Features
//!
//! - **Shell or argv**: pass a command line or an argument vector, with or
//!   without the system shell
//! - **Tee**: echo output live through thread, tokio or pty backends
//! - **Timeouts**: the whole process group is killed at the deadline
//! - **Detach**: start a process and get a handle back immediately
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_cmd::{cmd, Invocation};
//!
//! fn main() -> shell_cmd::Result<()> {
//!     shell_cmd::logging::try_init().ok();
//!
//!     let output = cmd(&Invocation::new("echo hello").shell(true))?.into_output()?;
//!     assert_eq!(output.stdout_str(), "hello\n");
//!
//!     let output = cmd(&Invocation::new(["ls", "-la"]).verbose(1))?.into_output()?;
//!     println!("exit code {}", output.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod output;
pub mod platform;

// Re-export commonly used types
pub use error::{CmdError, Result};
pub use execution::{
    cmd, cmd_async, cmd_with_sink, execute_simple, execute_streaming, CmdOutput, CommandSpec,
    DetachedProcess, Invocation, Outcome, OutputChunk, OutputSource, TeeBackend, TeePolicy,
};
pub use output::{OutputSanitizer, TeeSink};
pub use platform::{Platform, POSIX, WIN32};

//! Output-draining backends and the plumbing they share.

pub(crate) mod async_pipes;
pub(crate) mod pty;
pub(crate) mod thread;

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::command::{CommandSpec, Invocation};
use super::process_group;
use super::quoting;
use super::result::{OutputChunk, OutputSource};
use crate::error::CmdError;
use crate::output::TeeSink;
use crate::platform;
use crate::Result;

/// Default buffer size for reading child output.
pub(crate) const READ_BUFFER_SIZE: usize = 4096;

/// How long to wait for readers after a kill before abandoning them.
pub(crate) const READER_GRACE: Duration = Duration::from_millis(500);

/// Interval between exit polls while a deadline is pending.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A command resolved to a concrete program and argument list.
#[derive(Debug, Clone)]
pub(crate) struct Prepared {
    /// Program to exec (absolute when resolved through `PATH`).
    pub program: OsString,
    pub args: Vec<String>,
    /// Display text of the original command.
    pub display: String,
    pub cwd: Option<PathBuf>,
    pub env: Option<HashMap<String, String>>,
}

impl Prepared {
    /// Resolve the execution mode of an invocation.
    ///
    /// `through_shell` forces the shell form (used by system mode).
    pub fn from_invocation(invocation: &Invocation, through_shell: bool) -> Result<Self> {
        let display = invocation.command.display_text();
        let cwd = invocation.cwd.clone();
        let env = invocation.env.clone();

        if invocation.shell || through_shell {
            let line = match &invocation.command {
                CommandSpec::Shell(line) => line.clone(),
                CommandSpec::Argv(argv) => quoting::join(argv),
            };
            let (shell, flag) = platform::shell_program();
            return Ok(Self {
                program: shell.into(),
                args: vec![flag.to_string(), line],
                display,
                cwd,
                env,
            });
        }

        let mut argv = match &invocation.command {
            CommandSpec::Argv(argv) => argv.clone(),
            CommandSpec::Shell(line) => quoting::split(line)?,
        };
        if argv.is_empty() {
            return Err(CmdError::InvalidArgument("command cannot be empty".into()));
        }
        let name = argv.remove(0);
        let program = resolve_program(&name, env.as_ref(), cwd.as_deref())?;
        debug!(name = %name, program = %program.display(), "resolved program");

        Ok(Self {
            program: program.into_os_string(),
            args: argv,
            display,
            cwd,
            env,
        })
    }

    /// Build a std command with program, args, cwd and env applied.
    pub fn std_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            command.current_dir(cwd);
        }
        if let Some(ref env) = self.env {
            command.env_clear().envs(env);
        }
        process_group::isolate(&mut command);
        command
    }

    /// Map a spawn failure to the error the caller should see.
    pub fn spawn_error(&self, err: io::Error) -> CmdError {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                CmdError::CommandNotFound(self.program.to_string_lossy().into_owned())
            }
            _ => CmdError::Io(err),
        }
    }

    /// Spawn with the given stdio configuration.
    pub fn spawn(&self, stdin: Stdio, stdout: Stdio, stderr: Stdio) -> Result<Child> {
        let child = self
            .std_command()
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        debug!(pid = child.id(), command = %self.display, "spawned");
        Ok(child)
    }

    pub fn timeout_error(&self, timeout: Duration, capture: Capture) -> CmdError {
        warn!(command = %self.display, ?timeout, "command timed out; killed");
        CmdError::Timeout {
            command: self.display.clone(),
            timeout,
            stdout: String::from_utf8_lossy(&capture.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&capture.stderr).into_owned(),
        }
    }
}

/// Find a program on the effective `PATH`, relative to the effective cwd.
fn resolve_program(
    name: &str,
    env: Option<&HashMap<String, String>>,
    cwd: Option<&Path>,
) -> Result<PathBuf> {
    let search_path = env
        .and_then(|env| env.get("PATH").map(OsString::from))
        .or_else(|| std::env::var_os("PATH"));
    // Relative programs are found from the child's directory; the result must
    // be absolute because the child starts there.
    let cwd = match cwd {
        Some(cwd) if cwd.is_absolute() => cwd.to_path_buf(),
        Some(cwd) => std::env::current_dir()?.join(cwd),
        None => std::env::current_dir()?,
    };
    which::which_in(name, search_path, cwd).map_err(|_| CmdError::CommandNotFound(name.to_string()))
}

/// Output captured so far, split by stream.
#[derive(Debug, Default)]
pub(crate) struct Capture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Capture {
    /// Record a chunk and echo it when teeing.
    pub fn push(&mut self, chunk: &OutputChunk, sink: Option<&mut (dyn TeeSink + '_)>) {
        match chunk.source {
            OutputSource::Stderr => self.stderr.extend_from_slice(&chunk.raw),
            OutputSource::Stdout | OutputSource::Combined => {
                self.stdout.extend_from_slice(&chunk.raw)
            }
        }
        if let Some(sink) = sink {
            if let Err(e) = sink.write_chunk(chunk) {
                debug!(error = %e, "tee write failed");
            }
        }
    }
}

/// Start a thread that forwards everything read from `reader` as chunks.
///
/// The thread ends at EOF, on a read error, or when the receiver is gone.
pub(crate) fn spawn_reader<R>(
    mut reader: R,
    source: OutputSource,
    tx: Sender<OutputChunk>,
) -> Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name(format!("shell-cmd-{source:?}").to_lowercase())
        .spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(OutputChunk::new(buf[..n].to_vec(), source)).is_err() {
                            break;
                        }
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        // A pty master reports EIO once the slave side is gone.
                        trace!(?source, error = %e, "reader stopped");
                        break;
                    }
                }
            }
        })?;
    Ok(handle)
}

/// Pump chunks into the capture until every reader is done.
///
/// Returns `false` if the deadline passed first.
pub(crate) fn pump(
    rx: &Receiver<OutputChunk>,
    deadline: Option<Instant>,
    capture: &mut Capture,
    mut sink: Option<&mut (dyn TeeSink + '_)>,
) -> bool {
    loop {
        let next = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                rx.recv_timeout(deadline - now)
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(chunk) => capture.push(&chunk, sink.as_deref_mut()),
            Err(RecvTimeoutError::Timeout) => return false,
            Err(RecvTimeoutError::Disconnected) => return true,
        }
    }
}

/// After a kill, collect what the readers still hold and join them.
///
/// Readers that do not finish within the grace period are abandoned; that
/// only happens when something outside the process group keeps a pipe open.
pub(crate) fn drain_after_kill(
    rx: &Receiver<OutputChunk>,
    readers: Vec<JoinHandle<()>>,
    capture: &mut Capture,
) {
    let finished = pump(rx, Some(Instant::now() + READER_GRACE), capture, None);
    if finished {
        join_readers(readers);
    } else {
        warn!(count = readers.len(), "output readers still blocked after kill; abandoning");
    }
}

pub(crate) fn join_readers(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        if reader.join().is_err() {
            warn!("output reader panicked");
        }
    }
}

/// Wait for a child, giving up at the deadline.
pub(crate) fn wait_until(child: &mut Child, deadline: Option<Instant>) -> Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return Ok(Some(child.wait()?));
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

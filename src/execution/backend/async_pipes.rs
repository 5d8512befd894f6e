//! Tokio backend: both pipes drained by one task under `select!`.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{Capture, Prepared, READER_GRACE, READ_BUFFER_SIZE};
use crate::error::CmdError;
use crate::execution::command::TeeBackend;
use crate::execution::process_group;
use crate::execution::result::{exit_code_of, CmdOutput, OutputChunk};
use crate::output::TeeSink;
use crate::Result;

/// Run on a private current-thread runtime, blocking the caller.
///
/// When the caller is already inside a runtime, the private runtime gets its
/// own thread, since one runtime cannot be started inside another.
pub(crate) fn run_blocking(
    prepared: &Prepared,
    timeout: Option<Duration>,
    sink: Option<&mut (dyn TeeSink + '_)>,
) -> Result<CmdOutput> {
    if tokio::runtime::Handle::try_current().is_err() {
        return block_on_private(prepared, timeout, sink);
    }

    debug!("inside a tokio runtime; running the tokio backend on its own thread");
    std::thread::scope(|scope| {
        std::thread::Builder::new()
            .name("shell-cmd-tokio".to_string())
            .spawn_scoped(scope, move || block_on_private(prepared, timeout, sink))?
            .join()
            .map_err(|_| CmdError::Runtime("tokio backend thread panicked".into()))?
    })
}

fn block_on_private(
    prepared: &Prepared,
    timeout: Option<Duration>,
    sink: Option<&mut (dyn TeeSink + '_)>,
) -> Result<CmdOutput> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CmdError::Runtime(e.to_string()))?;
    runtime.block_on(run(prepared, timeout, sink))
}

/// Run to completion on the current runtime.
pub(crate) async fn run(
    prepared: &Prepared,
    timeout: Option<Duration>,
    mut sink: Option<&mut (dyn TeeSink + '_)>,
) -> Result<CmdOutput> {
    let mut std_command = prepared.std_command();
    std_command
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut command = tokio::process::Command::from(std_command);
    command.kill_on_drop(true);

    let start = Instant::now();
    let mut child = command.spawn().map_err(|e| prepared.spawn_error(e))?;
    debug!(pid = ?child.id(), command = %prepared.display, "spawned");

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| CmdError::Io(std::io::Error::other("stdout was not piped")))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| CmdError::Io(std::io::Error::other("stderr was not piped")))?;

    let mut capture = Capture::default();
    let drain = async {
        let mut out_buf = [0u8; READ_BUFFER_SIZE];
        let mut err_buf = [0u8; READ_BUFFER_SIZE];
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if out_open => match read? {
                    0 => out_open = false,
                    n => capture.push(&OutputChunk::stdout(out_buf[..n].to_vec()), sink.as_deref_mut()),
                },
                read = stderr.read(&mut err_buf), if err_open => match read? {
                    0 => err_open = false,
                    n => capture.push(&OutputChunk::stderr(err_buf[..n].to_vec()), sink.as_deref_mut()),
                },
            }
        }

        child.wait().await
    };

    let waited = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, drain).await.ok(),
        None => Some(drain.await),
    };

    let Some(status) = waited else {
        if let Some(pid) = child.id() {
            process_group::kill_pid_tree(pid);
        }
        if let Err(e) = child.start_kill() {
            debug!(error = %e, "direct kill failed");
        }
        child.wait().await?;
        drain_after_kill(&mut stdout, &mut stderr, &mut capture).await;
        return Err(prepared.timeout_error(timeout.unwrap_or_default(), capture));
    };

    let status = status?;
    let duration = start.elapsed();
    let exit_code = exit_code_of(status);
    debug!(command = %prepared.display, exit_code, ?duration, "finished");

    Ok(CmdOutput {
        command: prepared.display.clone(),
        stdout: Some(String::from_utf8_lossy(&capture.stdout).into_owned()),
        stderr: Some(String::from_utf8_lossy(&capture.stderr).into_owned()),
        exit_code,
        cwd: prepared.cwd.clone(),
        duration,
        backend: TeeBackend::Tokio,
    })
}

/// Collect what is left in the pipes after a kill, within the reader grace.
async fn drain_after_kill(
    stdout: &mut ChildStdout,
    stderr: &mut ChildStderr,
    capture: &mut Capture,
) {
    let drain = async {
        let mut rest = Vec::new();
        if stdout.read_to_end(&mut rest).await.is_ok() {
            capture.stdout.extend_from_slice(&rest);
        }
        rest.clear();
        if stderr.read_to_end(&mut rest).await.is_ok() {
            capture.stderr.extend_from_slice(&rest);
        }
    };
    if tokio::time::timeout(READER_GRACE, drain).await.is_err() {
        warn!("output pipes still open after kill; abandoning");
    }
}

/// Tee sink that forwards chunks to an async receiver.
pub(crate) struct ChannelSink {
    tx: mpsc::UnboundedSender<OutputChunk>,
}

impl ChannelSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<OutputChunk>) -> Self {
        Self { tx }
    }
}

impl TeeSink for ChannelSink {
    fn write_chunk(&mut self, chunk: &OutputChunk) -> std::io::Result<()> {
        // A dropped receiver only means nobody is watching any more.
        let _ = self.tx.send(chunk.clone());
        Ok(())
    }

    fn write_note(&mut self, _line: &str) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::execution::Invocation;
    use crate::output::BufferSink;

    fn prepared(inv: Invocation) -> Prepared {
        Prepared::from_invocation(&inv, false).unwrap()
    }

    #[test]
    fn test_run_blocking_captures() {
        let p = prepared(Invocation::new("echo out; echo err >&2; exit 5").shell(true));
        let mut sink = BufferSink::new();
        let output = run_blocking(&p, None, Some(&mut sink)).unwrap();

        assert_eq!(output.stdout.as_deref(), Some("out\n"));
        assert_eq!(output.stderr.as_deref(), Some("err\n"));
        assert_eq!(output.exit_code, 5);
        assert_eq!(output.backend, TeeBackend::Tokio);
        assert_eq!(sink.stdout_text(), "out\n");
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let p = prepared(Invocation::new(["sleep", "10"]));
        let start = Instant::now();
        let err = run(&p, Some(Duration::from_millis(50)), None).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink = ChannelSink::new(tx);
        sink.write_chunk(&OutputChunk::stdout(b"hi".to_vec())).unwrap();
        drop(sink);

        let chunk = rx.recv().await.unwrap();
        assert_eq!(chunk.raw, b"hi");
        assert!(rx.recv().await.is_none());
    }
}

//! Command execution entry points.

use std::process::Stdio;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info_span, Instrument};

use super::backend::{self, async_pipes, Prepared};
use super::command::{Invocation, TeeBackend};
use super::process_group;
use super::result::{exit_code_of, CmdOutput, DetachedProcess, Outcome, OutputChunk};
use super::validation::{self, sanitize_for_display};
use crate::error::CmdError;
use crate::output::{StdioSink, TeeSink};
use crate::Result;

/// Run a command, echoing live output to the caller's stdout and stderr.
///
/// Blocks until the command exits unless `detach` is set.
pub fn cmd(invocation: &Invocation) -> Result<Outcome> {
    let mut sink = StdioSink;
    cmd_with_sink(invocation, &mut sink)
}

/// Run a command, echoing live output (when teeing) to `sink`.
pub fn cmd_with_sink(
    invocation: &Invocation,
    sink: &mut (dyn TeeSink + '_),
) -> Result<Outcome> {
    validation::validate(invocation)?;
    let span = info_span!("cmd", command = %sanitize_for_display(&invocation.command.display_text()));
    let _guard = span.enter();

    let prepared = Prepared::from_invocation(invocation, invocation.system)?;
    announce(invocation, &prepared, sink);

    if invocation.detach {
        return spawn_detached(&prepared, invocation.verbose).map(Outcome::Detached);
    }

    let tee = invocation.resolved_tee();
    let output = if invocation.system {
        run_system(&prepared, invocation)?
    } else {
        let tee_sink = if tee { Some(&mut *sink) } else { None };
        match invocation.tee_backend.resolve() {
            TeeBackend::Tokio => async_pipes::run_blocking(&prepared, invocation.timeout, tee_sink)?,
            TeeBackend::Pty => backend::pty::run(&prepared, invocation.timeout, tee_sink)?,
            _ => backend::thread::run(&prepared, invocation.timeout, tee_sink)?,
        }
    };

    finish(invocation, output, sink).map(Outcome::Completed)
}

/// Async variant of [`cmd`] for callers already inside a tokio runtime.
///
/// Captured runs always use the tokio backend unless the pty backend was
/// requested; system and pty runs move to the blocking pool.
pub async fn cmd_async(invocation: &Invocation) -> Result<Outcome> {
    validation::validate(invocation)?;
    let span = info_span!("cmd", command = %sanitize_for_display(&invocation.command.display_text()));
    run_async(invocation).instrument(span).await
}

async fn run_async(invocation: &Invocation) -> Result<Outcome> {
    let prepared = Prepared::from_invocation(invocation, invocation.system)?;
    let mut sink = StdioSink;
    announce(invocation, &prepared, &mut sink);

    if invocation.detach {
        return spawn_detached(&prepared, invocation.verbose).map(Outcome::Detached);
    }

    let tee = invocation.resolved_tee();
    let output = if invocation.system || invocation.tee_backend == TeeBackend::Pty {
        let owned = invocation.clone();
        tokio::task::spawn_blocking(move || {
            if owned.system {
                run_system(&prepared, &owned)
            } else {
                let mut sink = StdioSink;
                let tee_sink: Option<&mut dyn TeeSink> = if tee { Some(&mut sink) } else { None };
                backend::pty::run(&prepared, owned.timeout, tee_sink)
            }
        })
        .await
        .map_err(|e| CmdError::Runtime(e.to_string()))??
    } else {
        let tee_sink: Option<&mut dyn TeeSink> = if tee { Some(&mut sink) } else { None };
        async_pipes::run(&prepared, invocation.timeout, tee_sink).await?
    };

    finish(invocation, output, &mut sink).map(Outcome::Completed)
}

/// Start a command and stream its output as it arrives.
///
/// Every chunk is sent to the receiver whatever the tee policy; the handle
/// resolves to the final result. Must be called inside a tokio runtime.
pub async fn execute_streaming(
    invocation: &Invocation,
) -> Result<(
    mpsc::UnboundedReceiver<OutputChunk>,
    tokio::task::JoinHandle<Result<CmdOutput>>,
)> {
    validation::validate(invocation)?;
    if invocation.detach || invocation.system {
        return Err(CmdError::InvalidArgument(
            "streaming needs captured output; detach and system are not supported".into(),
        ));
    }
    let prepared = Prepared::from_invocation(invocation, false)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let owned = invocation.clone();

    let handle = tokio::spawn(async move {
        let mut sink = async_pipes::ChannelSink::new(tx);
        let output = async_pipes::run(&prepared, owned.timeout, Some(&mut sink)).await?;
        if owned.check {
            output.check_returncode()
        } else {
            Ok(output)
        }
    });

    Ok((rx, handle))
}

/// Echo the command line before running, depending on verbosity.
fn announce(invocation: &Invocation, prepared: &Prepared, sink: &mut (dyn TeeSink + '_)) {
    if invocation.verbose >= 3 {
        note(sink, &format!("=== start: {} ===", prepared.display));
    }
    if invocation.verbose >= 2 {
        let cwd = match invocation.cwd {
            Some(ref cwd) => cwd.display().to_string(),
            None => std::env::current_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|_| ".".to_string()),
        };
        note(sink, &format!("[{cwd}] $ {}", prepared.display));
    }
}

/// Echo the footer and apply `check`.
fn finish(
    invocation: &Invocation,
    output: CmdOutput,
    sink: &mut (dyn TeeSink + '_),
) -> Result<CmdOutput> {
    if invocation.verbose >= 3 {
        note(sink, &format!("=== end: exit code {} ===", output.exit_code));
    }
    if invocation.check {
        output.check_returncode()
    } else {
        Ok(output)
    }
}

fn note(sink: &mut (dyn TeeSink + '_), line: &str) {
    if let Err(e) = sink.write_note(line) {
        debug!(error = %e, "tee note failed");
    }
}

/// Launch without waiting; the caller owns the returned handle.
fn spawn_detached(prepared: &Prepared, verbose: u8) -> Result<DetachedProcess> {
    let inherit_output = verbose > 0;
    let output_stdio = || {
        if inherit_output {
            Stdio::inherit()
        } else {
            Stdio::null()
        }
    };
    let child = prepared.spawn(Stdio::null(), output_stdio(), output_stdio())?;
    debug!(pid = child.id(), "detached");
    Ok(DetachedProcess::new(child, prepared.display.clone()))
}

/// Run through the shell with inherited stdio; nothing is captured.
fn run_system(prepared: &Prepared, invocation: &Invocation) -> Result<CmdOutput> {
    let start = Instant::now();
    let deadline = invocation.timeout.map(|t| start + t);
    let mut child = prepared.spawn(Stdio::inherit(), Stdio::inherit(), Stdio::inherit())?;

    let Some(status) = backend::wait_until(&mut child, deadline)? else {
        process_group::kill_tree(&mut child);
        child.wait()?;
        return Err(prepared.timeout_error(invocation.timeout.unwrap_or_default(), Default::default()));
    };

    let mut output = CmdOutput::new(prepared.display.clone(), invocation.tee_backend.resolve());
    output.exit_code = exit_code_of(status);
    output.cwd = prepared.cwd.clone();
    output.duration = start.elapsed();
    debug!(exit_code = output.exit_code, duration = ?output.duration, "system command finished");
    Ok(output)
}

/// One-shot shell execution with default options.
pub fn execute_simple(command_line: &str) -> Result<CmdOutput> {
    cmd(&Invocation::new(command_line).shell(true))?.into_output()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::output::BufferSink;
    use std::time::Duration;

    #[test]
    fn test_execute_simple_echo() {
        let output = execute_simple("echo test").unwrap();
        assert_eq!(output.stdout_str(), "test\n");
        assert!(output.success());
    }

    #[test]
    fn test_no_tee_by_default() {
        let mut sink = BufferSink::new();
        let inv = Invocation::new("echo quiet").shell(true);
        cmd_with_sink(&inv, &mut sink).unwrap();
        assert!(sink.stdout.is_empty());
        assert!(sink.notes.is_empty());
    }

    #[test]
    fn test_verbose_tees_and_announces() {
        let mut sink = BufferSink::new();
        let inv = Invocation::new("echo loud").shell(true).verbose(3);
        let output = cmd_with_sink(&inv, &mut sink).unwrap().into_output().unwrap();

        assert_eq!(output.stdout_str(), "loud\n");
        assert_eq!(sink.stdout_text(), "loud\n");
        assert_eq!(sink.notes.len(), 3);
        assert!(sink.notes[0].contains("start"));
        assert!(sink.notes[1].ends_with("$ echo loud"));
        assert!(sink.notes[2].contains("exit code 0"));
    }

    #[test]
    fn test_explicit_tee_overrides_verbose() {
        let mut sink = BufferSink::new();
        let inv = Invocation::new("echo x").shell(true).verbose(1).tee(Some(false));
        cmd_with_sink(&inv, &mut sink).unwrap();
        assert!(sink.stdout.is_empty());

        let inv = Invocation::new("echo y").shell(true).tee(Some(true));
        cmd_with_sink(&inv, &mut sink).unwrap();
        assert_eq!(sink.stdout_text(), "y\n");
    }

    #[test]
    fn test_system_mode_does_not_capture() {
        let inv = Invocation::new("exit 6").system(true);
        let output = cmd(&inv).unwrap().into_output().unwrap();
        assert_eq!(output.exit_code, 6);
        assert!(output.stdout.is_none());
        assert!(output.stderr.is_none());
    }

    #[test]
    fn test_system_mode_timeout() {
        let inv = Invocation::new("sleep 10").system(true).timeout(Duration::from_millis(50));
        let err = cmd(&inv).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_validation_runs_first() {
        let inv = Invocation::new("true").cwd("/definitely/not/here");
        assert!(matches!(cmd(&inv), Err(CmdError::InvalidWorkingDirectory(_))));
    }

    #[tokio::test]
    async fn test_cmd_async() {
        let inv = Invocation::new(["sh", "-c", "echo async; exit 3"]);
        let output = cmd_async(&inv).await.unwrap().into_output().unwrap();
        assert_eq!(output.stdout_str(), "async\n");
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.backend, TeeBackend::Tokio);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cmd_async_events_carry_the_command_span() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        cmd_async(&Invocation::new(["echo", "spanned"])).await.unwrap();

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("cmd{command=echo spanned}"), "{text}");
    }

    #[tokio::test]
    async fn test_execute_streaming() {
        let inv = Invocation::new("echo one; echo two >&2").shell(true);
        let (mut rx, handle) = execute_streaming(&inv).await.unwrap();

        let mut seen = Vec::new();
        while let Some(chunk) = rx.recv().await {
            seen.extend_from_slice(&chunk.raw);
        }
        let output = handle.await.unwrap().unwrap();

        assert_eq!(seen.len(), "one\ntwo\n".len());
        assert_eq!(output.stdout_str(), "one\n");
        assert_eq!(output.stderr_str(), "two\n");
    }

    #[tokio::test]
    async fn test_execute_streaming_rejects_detach() {
        let inv = Invocation::new("true").shell(true).detach(true);
        assert!(execute_streaming(&inv).await.is_err());
    }
}

//! PTY backend: the command sees a terminal, output arrives combined.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tracing::debug;

use super::{drain_after_kill, join_readers, pump, spawn_reader, Capture, Prepared, POLL_INTERVAL};
use crate::error::CmdError;
use crate::execution::command::TeeBackend;
use crate::execution::process_group;
use crate::execution::result::{CmdOutput, OutputSource};
use crate::output::{OutputSanitizer, TeeSink};
use crate::Result;

/// Terminal size reported to the child.
const PTY_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 80,
    pixel_width: 0,
    pixel_height: 0,
};

/// Run to completion inside a pseudo-terminal.
pub(crate) fn run(
    prepared: &Prepared,
    timeout: Option<Duration>,
    mut sink: Option<&mut (dyn TeeSink + '_)>,
) -> Result<CmdOutput> {
    let pair = native_pty_system()
        .openpty(PTY_SIZE)
        .map_err(|e| CmdError::Pty(e.to_string()))?;

    let mut builder = CommandBuilder::new(&prepared.program);
    builder.args(&prepared.args);
    // portable-pty does not default to the caller's directory.
    let cwd = match prepared.cwd {
        Some(ref cwd) => cwd.clone(),
        None => std::env::current_dir()?,
    };
    builder.cwd(cwd);
    if let Some(ref env) = prepared.env {
        builder.env_clear();
        for (key, value) in env {
            builder.env(key, value);
        }
    }

    let start = Instant::now();
    let deadline = timeout.map(|t| start + t);
    let mut child = pair
        .slave
        .spawn_command(builder)
        .map_err(|e| CmdError::Pty(format!("failed to spawn {}: {e}", prepared.display)))?;
    // The reader only sees EOF once every slave handle is closed.
    drop(pair.slave);
    let pid = child.process_id();
    debug!(?pid, command = %prepared.display, "spawned in pty");

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| CmdError::Pty(e.to_string()))?;
    let (tx, rx) = mpsc::channel();
    let readers = vec![spawn_reader(reader, OutputSource::Combined, tx)?];

    let mut capture = Capture::default();
    let drained = pump(&rx, deadline, &mut capture, sink.as_deref_mut());

    let status = if drained {
        loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            match deadline {
                Some(deadline) if Instant::now() >= deadline => break None,
                _ => std::thread::sleep(POLL_INTERVAL),
            }
        }
    } else {
        None
    };

    let Some(status) = status else {
        let group_killed = pid.is_some_and(process_group::kill_pid_tree);
        if !group_killed {
            let _ = child.kill();
        }
        child.wait()?;
        drop(pair.master);
        drain_after_kill(&rx, readers, &mut capture);
        capture.stdout = OutputSanitizer::strip_ansi(&capture.stdout).into_bytes();
        return Err(prepared.timeout_error(timeout.unwrap_or_default(), capture));
    };

    drop(pair.master);
    join_readers(readers);
    let duration = start.elapsed();
    let exit_code = if status.success() {
        0
    } else {
        i32::try_from(status.exit_code()).unwrap_or(i32::MAX)
    };
    debug!(command = %prepared.display, exit_code, ?duration, "finished");

    Ok(CmdOutput {
        command: prepared.display.clone(),
        stdout: Some(OutputSanitizer::strip_ansi(&capture.stdout)),
        stderr: None,
        exit_code,
        cwd: prepared.cwd.clone(),
        duration,
        backend: TeeBackend::Pty,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::execution::Invocation;

    fn pty_available() -> bool {
        match native_pty_system().openpty(PTY_SIZE) {
            Ok(_) => true,
            Err(e) => {
                eprintln!("no pseudo-terminal available, skipping: {e}");
                false
            }
        }
    }

    #[test]
    fn test_pty_combines_streams() {
        if !pty_available() {
            return;
        }
        let inv = Invocation::new("echo out; echo err >&2; exit 2").shell(true);
        let p = Prepared::from_invocation(&inv, false).unwrap();
        let output = run(&p, Some(Duration::from_secs(10)), None).unwrap();

        assert_eq!(output.exit_code, 2);
        assert_eq!(output.backend, TeeBackend::Pty);
        assert!(output.stderr.is_none());
        assert!(output.stdout_str().contains("out\n"));
        assert!(output.stdout_str().contains("err\n"));
        assert!(!output.stdout_str().contains('\r'));
    }

    #[test]
    fn test_pty_tees_combined_chunks() {
        if !pty_available() {
            return;
        }
        let inv = Invocation::new(["echo", "seen"]);
        let p = Prepared::from_invocation(&inv, false).unwrap();
        let mut sink = crate::output::BufferSink::new();
        run(&p, Some(Duration::from_secs(10)), Some(&mut sink)).unwrap();

        assert!(sink.stdout_text().contains("seen"));
    }

    #[test]
    fn test_pty_timeout() {
        if !pty_available() {
            return;
        }
        let inv = Invocation::new(["sleep", "10"]);
        let p = Prepared::from_invocation(&inv, false).unwrap();
        let start = Instant::now();
        let err = run(&p, Some(Duration::from_millis(100)), None).unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}

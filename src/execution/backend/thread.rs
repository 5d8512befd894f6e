//! Thread backend: one blocking reader thread per pipe.

use std::process::Stdio;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{drain_after_kill, join_readers, pump, spawn_reader, wait_until, Capture, Prepared};
use crate::error::CmdError;
use crate::execution::command::TeeBackend;
use crate::execution::process_group;
use crate::execution::result::{exit_code_of, CmdOutput, OutputSource};
use crate::output::TeeSink;
use crate::Result;

/// Run to completion, capturing both pipes.
pub(crate) fn run(
    prepared: &Prepared,
    timeout: Option<Duration>,
    mut sink: Option<&mut (dyn TeeSink + '_)>,
) -> Result<CmdOutput> {
    let start = Instant::now();
    let deadline = timeout.map(|t| start + t);

    let mut child = prepared.spawn(Stdio::inherit(), Stdio::piped(), Stdio::piped())?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CmdError::Io(std::io::Error::other("stdout was not piped")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| CmdError::Io(std::io::Error::other("stderr was not piped")))?;

    let (tx, rx) = mpsc::channel();
    let readers = vec![
        spawn_reader(stdout, OutputSource::Stdout, tx.clone())?,
        spawn_reader(stderr, OutputSource::Stderr, tx)?,
    ];

    let mut capture = Capture::default();
    let drained = pump(&rx, deadline, &mut capture, sink.as_deref_mut());

    // Pipes can close before the process exits, so the deadline still applies.
    let status = if drained {
        wait_until(&mut child, deadline)?
    } else {
        None
    };

    let Some(status) = status else {
        process_group::kill_tree(&mut child);
        child.wait()?;
        drain_after_kill(&rx, readers, &mut capture);
        return Err(prepared.timeout_error(timeout.unwrap_or_default(), capture));
    };

    join_readers(readers);
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
        backend: TeeBackend::Thread,
    })
}

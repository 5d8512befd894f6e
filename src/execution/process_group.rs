//! Process group placement and tree kills.
//!
//! On Unix every spawned child leads its own process group, so a kill on
//! timeout reaches the shell and anything it started. Elsewhere only the
//! direct child is killed.

use std::process::{Child, Command};

use tracing::{debug, warn};

/// Put the child in a new process group led by itself.
pub(crate) fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    let _ = cmd;
}

/// Kill the group led by `pid` (or just `pid` off Unix).
pub(crate) fn kill_pid_tree(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Ok(pgid) = i32::try_from(pid) else {
            return false;
        };
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) => true,
            Err(e) => {
                debug!(pid, error = %e, "process group kill failed");
                false
            }
        }
    }
    #[cfg(not(unix))]
    {
        debug!(pid, "process groups unsupported; relying on direct kill");
        false
    }
}

/// Kill a child and its process group. The caller still has to reap it.
pub(crate) fn kill_tree(child: &mut Child) {
    let group_killed = kill_pid_tree(child.id());
    if !group_killed {
        if let Err(e) = child.kill() {
            // Already exited is the common case here.
            if e.kind() != std::io::ErrorKind::InvalidInput {
                warn!(pid = child.id(), error = %e, "failed to kill child");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    #[test]
    fn test_kill_tree_reaps_shell_and_children() {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg("sleep 30 & sleep 30; wait")
            .stdout(Stdio::null());
        isolate(&mut cmd);
        let mut child = cmd.spawn().unwrap();

        std::thread::sleep(Duration::from_millis(50));
        kill_tree(&mut child);

        let start = Instant::now();
        child.wait().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_kill_pid_tree_signals_the_group() {
        use std::os::unix::process::ExitStatusExt;

        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        isolate(&mut cmd);
        let mut child = cmd.spawn().unwrap();

        assert!(kill_pid_tree(child.id()));
        assert_eq!(child.wait().unwrap().signal(), Some(9));
    }

    #[test]
    fn test_kill_after_exit_is_harmless() {
        let mut child = Command::new("true").spawn().unwrap();
        child.wait().unwrap();
        kill_tree(&mut child);
    }
}

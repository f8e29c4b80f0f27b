use super::command::{SessionCommand, SessionEnv};
use log::{error, info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// How a session child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Exited(i32),
    Signaled(i32),
    /// The child could not be spawned or waited on.
    Failed,
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit status {code}"),
            Self::Signaled(sig) => write!(f, "killed by signal {sig}"),
            Self::Failed => f.write_str("failed to run"),
        }
    }
}

/// Runs a session to completion.
pub trait SessionRunner: Send + Sync {
    fn run(&self, command: &SessionCommand, env: &SessionEnv) -> ChildExit;
}

/// Spawns real child processes and tracks the running PID so host
/// termination signals can be forwarded to it.
pub struct ProcessRunner {
    current_child: Arc<AtomicI32>,
    shutdown: Arc<AtomicBool>,
}

impl ProcessRunner {
    pub fn new(current_child: Arc<AtomicI32>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            current_child,
            shutdown,
        }
    }
}

impl SessionRunner for ProcessRunner {
    fn run(&self, command: &SessionCommand, env: &SessionEnv) -> ChildExit {
        let mut child = match command.to_command(env).spawn() {
            Ok(child) => child,
            Err(err) => {
                error!(
                    "Failed to start {}: {}",
                    command.program.to_string_lossy(),
                    err
                );
                return ChildExit::Failed;
            }
        };

        let pid = child.id() as i32;
        self.current_child.store(pid, Ordering::Release);
        info!(
            "Session {} running (pid {})",
            command.program.to_string_lossy(),
            pid
        );

        // The signal may have landed between spawn and the store above.
        if self.shutdown.load(Ordering::Acquire) {
            forward_termination(pid);
        }

        let status = child.wait();
        self.current_child.store(0, Ordering::Release);

        match status {
            Ok(status) => match (status.code(), status.signal()) {
                (Some(code), _) => ChildExit::Exited(code),
                (None, Some(sig)) => ChildExit::Signaled(sig),
                (None, None) => ChildExit::Failed,
            },
            Err(err) => {
                error!("Failed to wait for session pid {pid}: {err}");
                ChildExit::Failed
            }
        }
    }
}

/// Sends SIGTERM to `pid`; zero means no child is running.
pub fn forward_termination(pid: i32) {
    if pid <= 0 {
        return;
    }
    match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => info!("Forwarded SIGTERM to session pid {pid}"),
        Err(err) => warn!("Failed to forward SIGTERM to pid {pid}: {err}"),
    }
}

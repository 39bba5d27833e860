//! OS process facade

use std::io;
use std::process::{Child, ExitStatus};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Interval between exit checks while waiting for a child to terminate.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Capabilities the supervisor needs from an OS process.
pub trait ProcessHandle: Send + Sync {
    fn pid(&self) -> Option<u32>;

    fn is_alive(&self) -> io::Result<bool>;

    /// Ask the process to terminate. Graceful shutdown is up to the child.
    fn send_termination_signal(&self) -> io::Result<()>;

    /// Block until the process has exited.
    fn wait_for_exit(&self) -> io::Result<ExitStatus>;

    /// Release any pipe ends still held for the process.
    fn close_streams(&self);
}

/// A child spawned through `std::process`, signalled with SIGTERM.
#[derive(Debug)]
pub struct UnixProcess {
    pid: u32,
    child: Mutex<Child>,
}

impl UnixProcess {
    pub fn new(child: Child) -> Self {
        Self {
            pid: child.id(),
            child: Mutex::new(child),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProcessHandle for UnixProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn is_alive(&self) -> io::Result<bool> {
        Ok(self.lock().try_wait()?.is_none())
    }

    fn send_termination_signal(&self) -> io::Result<()> {
        // Holding the lock keeps the child from being reaped (and its PID
        // recycled) between the liveness check and the signal.
        let mut child = self.lock();
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        let pid = i32::try_from(self.pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "PID out of range"))?;
        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    fn wait_for_exit(&self) -> io::Result<ExitStatus> {
        // Poll instead of `Child::wait` so the watcher's liveness checks are
        // never stuck behind this lock.
        loop {
            if let Some(status) = self.lock().try_wait()? {
                return Ok(status);
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn close_streams(&self) {
        let mut child = self.lock();
        drop(child.stdin.take());
        drop(child.stdout.take());
        drop(child.stderr.take());
    }
}

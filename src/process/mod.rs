//! Supervised OS processes
//!
//! Everything between a `CommandDescriptor` and a running child: building the
//! invocation, spawning it with merged output, draining that output, and
//! deriving the child's observed phase from liveness plus signal flags.

mod drain;
mod error;
mod handle;
mod launcher;
mod managed;

pub use drain::OutputDrain;
pub use error::LaunchError;
pub use handle::{ProcessHandle, UnixProcess};
pub use launcher::{
    build_invocation, Invocation, Launcher, ProcessLauncher, PROPERTY_PROCESS_INDEX,
    PROPERTY_PROCESS_KEY, PROPERTY_SHARED_PATH, PROPERTY_TERMINATION_TIMEOUT,
};
pub use managed::{ManagedProcess, ObservedPhase};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Check if a process with the given PID is alive
///
/// Uses `nix::sys::signal::kill` with signal `None` (null signal / signal 0) to check
/// process existence. A zombie that has not been reaped yet still counts as alive;
/// use [`ProcessHandle::is_alive`] for children owned by the supervisor.
///
/// # Returns
/// * `true` - The process exists (regardless of signal permission)
/// * `false` - The process doesn't exist or the PID is invalid
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        // PID exceeds i32::MAX, treat as non-existent
        return false;
    };

    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true, // exists, but not ours to signal
        Err(_) => false,
    }
}

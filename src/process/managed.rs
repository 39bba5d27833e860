//! Runtime representation of one supervised child

use std::io;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::models::ProcessIdentity;
use crate::signals::SignalChannel;

use super::drain::OutputDrain;
use super::handle::ProcessHandle;

/// Lifecycle phase inferred from outside the child, recomputed on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservedPhase {
    Init,
    Up,
    Operational,
    AskedForRestart,
    AskedForShutdown,
    Stopped,
}

impl std::fmt::Display for ObservedPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservedPhase::Init => write!(f, "Init"),
            ObservedPhase::Up => write!(f, "Up"),
            ObservedPhase::Operational => write!(f, "Operational"),
            ObservedPhase::AskedForRestart => write!(f, "AskedForRestart"),
            ObservedPhase::AskedForShutdown => write!(f, "AskedForShutdown"),
            ObservedPhase::Stopped => write!(f, "Stopped"),
        }
    }
}

/// A supervised child: OS handle, signal slot reader and output drain.
///
/// A process without a handle never ran (its launch failed) and is always
/// observed as `Stopped`.
pub struct ManagedProcess {
    identity: ProcessIdentity,
    handle: Option<Box<dyn ProcessHandle>>,
    channel: Option<Box<dyn SignalChannel>>,
    drain: Mutex<Option<OutputDrain>>,
}

impl ManagedProcess {
    pub fn new(
        identity: ProcessIdentity,
        handle: Box<dyn ProcessHandle>,
        channel: Box<dyn SignalChannel>,
        drain: Option<OutputDrain>,
    ) -> Self {
        Self {
            identity,
            handle: Some(handle),
            channel: Some(channel),
            drain: Mutex::new(drain),
        }
    }

    /// Shell for a process whose launch failed.
    pub fn stopped(identity: ProcessIdentity) -> Self {
        Self {
            identity,
            handle: None,
            channel: None,
            drain: Mutex::new(None),
        }
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().and_then(|h| h.pid())
    }

    /// Derive the current phase from OS liveness and the signal flags.
    ///
    /// A dead or missing handle always wins. Otherwise the flags are checked
    /// in the fixed order `up`, `operational`, `stop`, `restart` and the first
    /// raised one decides: a child that raised both `up` and `operational` is
    /// reported `Up`, and a pending stop or restart request stays hidden while
    /// either readiness flag is raised.
    pub fn observed_phase(&self) -> io::Result<ObservedPhase> {
        let Some(handle) = &self.handle else {
            return Ok(ObservedPhase::Stopped);
        };
        if !handle.is_alive()? {
            return Ok(ObservedPhase::Stopped);
        }
        let Some(channel) = &self.channel else {
            return Ok(ObservedPhase::Init);
        };

        let phase = if channel.is_up() {
            ObservedPhase::Up
        } else if channel.is_operational() {
            ObservedPhase::Operational
        } else if channel.asked_for_stop() {
            ObservedPhase::AskedForShutdown
        } else if channel.asked_for_restart() {
            ObservedPhase::AskedForRestart
        } else {
            ObservedPhase::Init
        };
        Ok(phase)
    }

    /// Send a termination signal and block until the child has exited, then
    /// release its streams and join the output drain.
    ///
    /// No timeout is enforced here; the child was handed its termination
    /// timeout at launch. If waiting fails the child is assumed down.
    pub fn stop(&self) {
        if let Some(handle) = &self.handle {
            match handle.is_alive() {
                Ok(true) => {
                    debug!(process = %self.identity, "sending termination signal");
                    if let Err(e) = handle.send_termination_signal() {
                        warn!(process = %self.identity, error = %e, "failed to signal process");
                    }
                    if let Err(e) = handle.wait_for_exit() {
                        warn!(
                            process = %self.identity,
                            error = %e,
                            "interrupted while stopping process, assuming it is down"
                        );
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(process = %self.identity, error = %e, "cannot tell if process is alive, assuming it is down");
                }
            }
            handle.close_streams();
        }

        let drain = self.drain.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(drain) = drain {
            drain.join();
        }
    }
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("identity", &self.identity)
            .field("pid", &self.pid())
            .finish()
    }
}

impl std::fmt::Display for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Process[{}]", self.identity)
    }
}

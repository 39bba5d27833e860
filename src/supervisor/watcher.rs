//! Background loop turning observed phase changes into events and moves

use std::collections::{HashMap, HashSet};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::models::{ChangeEventKind, LifecycleState, ProcessIdentity};
use crate::process::{ManagedProcess, ObservedPhase};

use super::core::Shared;

/// Handle on the running watcher thread.
pub(super) struct StateWatcher {
    stop_flag: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl StateWatcher {
    pub(super) fn spawn(shared: Arc<Shared>, poll_interval: Duration) -> io::Result<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop_flag);
        let handle = thread::Builder::new()
            .name("state-watcher".to_string())
            .spawn(move || run(&shared, poll_interval, &flag))?;
        Ok(Self { stop_flag, handle })
    }

    /// Ask the loop to end and wait for the current tick to complete.
    pub(super) fn finish(self) {
        self.stop_flag.store(true, Ordering::Release);
        // A listener closing the supervisor runs on this very thread
        if self.handle.thread().id() == thread::current().id() {
            return;
        }
        self.handle.thread().unpark();
        if self.handle.join().is_err() {
            error!("state watcher thread panicked");
        }
    }
}

fn run(shared: &Shared, poll_interval: Duration, stop_flag: &AtomicBool) {
    let mut detection = Detection::new();
    loop {
        // Early or spurious wake-ups just mean an earlier tick
        thread::park_timeout(poll_interval);
        if stop_flag.load(Ordering::Acquire) {
            break;
        }
        detection.tick(shared);
    }
    debug!("state watcher finished");
}

/// Per-process phase memory across ticks.
///
/// Entries remember which process instance they belong to, so a restarted
/// identity starts from a clean slate.
pub(super) struct Detection {
    last_phases: HashMap<ProcessIdentity, (Arc<ManagedProcess>, ObservedPhase)>,
}

impl Detection {
    pub(super) fn new() -> Self {
        Self {
            last_phases: HashMap::new(),
        }
    }

    /// Inspect every registered process once.
    ///
    /// A failure while inspecting one process is logged and does not stop
    /// the others from being inspected.
    pub(super) fn tick(&mut self, shared: &Shared) {
        let processes = shared.snapshot();
        for process in &processes {
            let inspected =
                panic::catch_unwind(AssertUnwindSafe(|| self.inspect(shared, process)));
            match inspected {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(process = %process.identity(), error = %e, "failed to read process phase");
                }
                Err(_) => {
                    error!(process = %process.identity(), "panic while watching process");
                }
            }
        }

        let registered: HashSet<&ProcessIdentity> =
            processes.iter().map(|p| p.identity()).collect();
        self.last_phases.retain(|id, _| registered.contains(id));
    }

    fn inspect(&mut self, shared: &Shared, process: &Arc<ManagedProcess>) -> io::Result<()> {
        let identity = process.identity();
        let phase = process.observed_phase()?;
        let unchanged = self
            .last_phases
            .get(identity)
            .is_some_and(|(seen, last)| Arc::ptr_eq(seen, process) && *last == phase);
        if unchanged {
            return Ok(());
        }
        debug!(process = %identity, %phase, "observed phase changed");
        self.last_phases
            .insert(identity.clone(), (Arc::clone(process), phase));

        // Events go out before the lifecycle moves so listeners never see a
        // state ahead of the event explaining it.
        match phase {
            ObservedPhase::AskedForRestart => {
                shared.emit(identity, ChangeEventKind::RestartRequested);
            }
            ObservedPhase::AskedForShutdown => {
                shared.emit(identity, ChangeEventKind::StopRequested);
            }
            ObservedPhase::Operational => {
                shared.emit(identity, ChangeEventKind::Operational);
                shared.lifecycle(identity).try_move_to(LifecycleState::Started);
            }
            ObservedPhase::Up => {
                shared.emit(identity, ChangeEventKind::Started);
                shared.lifecycle(identity).try_move_to(LifecycleState::Started);
            }
            ObservedPhase::Stopped => {
                if let Err(e) = shared.channels.reset(identity.slot()) {
                    warn!(process = %identity, error = %e, "failed to reset signal slot");
                }
                shared.emit(identity, ChangeEventKind::Stopped);
                shared.lifecycle(identity).force_stopped();
            }
            ObservedPhase::Init => {}
        }
        Ok(())
    }
}

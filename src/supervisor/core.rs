//! Core Supervisor implementation

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{debug, error, info, warn};

use crate::models::{
    ChangeEvent, ChangeEventKind, CommandDescriptor, Lifecycle, LifecycleState, ProcessIdentity,
};
use crate::process::{LaunchError, Launcher, ManagedProcess, ProcessLauncher};
use crate::signals::{FileSignalChannels, SignalChannels};

use super::context::SupervisorContext;
use super::error::SupervisorError;
use super::listeners::{ChangeListener, ListenerSet};
use super::watcher::StateWatcher;

/// Result of a start request that was not rejected outright.
#[derive(Debug)]
pub enum StartOutcome {
    /// The child was spawned and is now watched.
    Launched(Arc<ManagedProcess>),
    /// The launch failed. `process` is a stopped shell, never registered;
    /// `UnableToStart` and `Stopped` have already been emitted.
    Failed {
        process: Arc<ManagedProcess>,
        reason: LaunchError,
    },
}

impl StartOutcome {
    pub fn process(&self) -> &Arc<ManagedProcess> {
        match self {
            StartOutcome::Launched(process) | StartOutcome::Failed { process, .. } => process,
        }
    }

    pub fn is_launched(&self) -> bool {
        matches!(self, StartOutcome::Launched(_))
    }
}

/// State shared between the caller thread and the watcher thread.
pub(super) struct Shared {
    processes: RwLock<Vec<Arc<ManagedProcess>>>,
    lifecycles: Mutex<HashMap<ProcessIdentity, Arc<Lifecycle>>>,
    pub(super) listeners: ListenerSet,
    pub(super) channels: Arc<dyn SignalChannels>,
}

impl Shared {
    pub(super) fn new(channels: Arc<dyn SignalChannels>) -> Self {
        Self {
            processes: RwLock::new(Vec::new()),
            lifecycles: Mutex::new(HashMap::new()),
            listeners: ListenerSet::default(),
            channels,
        }
    }

    /// Copy of the registered processes; the watcher iterates this while the
    /// caller keeps registering.
    pub(super) fn snapshot(&self) -> Vec<Arc<ManagedProcess>> {
        self.processes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(super) fn register(&self, process: Arc<ManagedProcess>) {
        self.processes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(process);
    }

    fn is_registered(&self, process: &ManagedProcess) -> bool {
        self.processes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|p| std::ptr::eq(Arc::as_ptr(p), process))
    }

    fn unregister(&self, identity: &ProcessIdentity) {
        self.processes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|p| p.identity() != identity);
    }

    fn clear(&self) {
        self.processes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn lock_lifecycles(&self) -> MutexGuard<'_, HashMap<ProcessIdentity, Arc<Lifecycle>>> {
        self.lifecycles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lifecycle of `identity`, created on first use.
    pub(super) fn lifecycle(&self, identity: &ProcessIdentity) -> Arc<Lifecycle> {
        Arc::clone(
            self.lock_lifecycles()
                .entry(identity.clone())
                .or_insert_with(|| Arc::new(Lifecycle::new())),
        )
    }

    fn existing_lifecycle(&self, identity: &ProcessIdentity) -> Option<Arc<Lifecycle>> {
        self.lock_lifecycles().get(identity).cloned()
    }

    /// Lifecycle to start `identity` with. A lifecycle that already reached
    /// `Stopped` is replaced along with its stale registration.
    pub(super) fn lifecycle_for_start(&self, identity: &ProcessIdentity) -> Arc<Lifecycle> {
        let mut lifecycles = self.lock_lifecycles();
        let terminal = lifecycles
            .get(identity)
            .is_some_and(|l| l.state().is_terminal());
        if terminal {
            lifecycles.remove(identity);
            self.unregister(identity);
        }
        Arc::clone(
            lifecycles
                .entry(identity.clone())
                .or_insert_with(|| Arc::new(Lifecycle::new())),
        )
    }

    pub(super) fn emit(&self, identity: &ProcessIdentity, kind: ChangeEventKind) {
        self.listeners
            .emit(&ChangeEvent::new(identity.clone(), kind));
    }
}

/// Supervises a group of local processes.
pub struct Supervisor {
    context: SupervisorContext,
    launcher: Arc<dyn Launcher>,
    shared: Arc<Shared>,
    watcher: Mutex<Option<StateWatcher>>,
    closed: AtomicBool,
}

impl Supervisor {
    /// Supervisor launching real processes, with flag-file signal channels
    /// under the context's shared directory.
    pub fn new(context: SupervisorContext) -> Result<Self, SupervisorError> {
        let channels: Arc<dyn SignalChannels> =
            Arc::new(FileSignalChannels::new(context.shared_dir()));
        let launcher = Arc::new(ProcessLauncher::new(&context, Arc::clone(&channels)));
        Self::with_parts(context, launcher, channels)
    }

    /// Supervisor over a custom launcher and signal channel allocator.
    pub fn with_parts(
        context: SupervisorContext,
        launcher: Arc<dyn Launcher>,
        channels: Arc<dyn SignalChannels>,
    ) -> Result<Self, SupervisorError> {
        let shared = Arc::new(Shared::new(channels));

        if let Some(slot) = context.own_slot() {
            if let Err(e) = shared.channels.create_after_clean(slot) {
                warn!(slot, error = %e, "failed to clean supervisor signal slot");
            }
        }

        let watcher = StateWatcher::spawn(Arc::clone(&shared), context.poll_interval())
            .map_err(SupervisorError::WatcherSpawn)?;

        Ok(Self {
            context,
            launcher,
            shared,
            watcher: Mutex::new(Some(watcher)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn context(&self) -> &SupervisorContext {
        &self.context
    }

    /// Snapshot of the registered processes, in start order.
    pub fn processes(&self) -> Vec<Arc<ManagedProcess>> {
        self.shared.snapshot()
    }

    /// Authoritative lifecycle state of `identity`, if it was ever started.
    pub fn state_of(&self, identity: &ProcessIdentity) -> Option<LifecycleState> {
        self.shared.existing_lifecycle(identity).map(|l| l.state())
    }

    /// Launch `command`.
    ///
    /// Fails with `DuplicateStart` when the identity is already starting,
    /// started or stopping. A launch failure is not an error here: the
    /// lifecycle is forced to `Stopped`, `UnableToStart` then `Stopped` are
    /// emitted, and the outcome carries the reason.
    pub fn start(&self, command: CommandDescriptor) -> Result<StartOutcome, SupervisorError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SupervisorError::Closed);
        }

        let identity = command.identity.clone();
        let lifecycle = self.shared.lifecycle_for_start(&identity);
        if !lifecycle.try_move_to(LifecycleState::Starting) {
            return Err(SupervisorError::DuplicateStart { identity });
        }

        match self.launcher.launch(&command) {
            Ok(process) => {
                let process = Arc::new(process);
                self.shared.register(Arc::clone(&process));
                Ok(StartOutcome::Launched(process))
            }
            Err(reason) => {
                error!(process = %identity, error = %reason, "{identity} failed to start");
                lifecycle.force_stopped();
                self.shared.emit(&identity, ChangeEventKind::UnableToStart);
                self.shared.emit(&identity, ChangeEventKind::Stopped);
                Ok(StartOutcome::Failed {
                    process: Arc::new(ManagedProcess::stopped(identity)),
                    reason,
                })
            }
        }
    }

    /// Stop `process`, blocking until it has exited.
    ///
    /// `process` must be the instance currently registered for its identity;
    /// a failed launch shell or a handle kept from before a restart is
    /// rejected as `NotRegistered`. Only a `Starting` or `Started` process can
    /// be stopped; anything else is reported as an illegal transition. The `Stopped` event and final move
    /// come from the watcher once it observes the exit.
    pub fn stop(&self, process: &ManagedProcess) -> Result<(), SupervisorError> {
        let identity = process.identity();
        if !self.shared.is_registered(process) {
            return Err(SupervisorError::NotRegistered {
                identity: identity.clone(),
            });
        }
        let lifecycle = self.shared.lifecycle(identity);
        let from = lifecycle.state();
        if !lifecycle.try_move_to(LifecycleState::Stopping) {
            return Err(SupervisorError::IllegalTransition {
                identity: identity.clone(),
                from,
                to: LifecycleState::Stopping,
            });
        }
        info!(process = %identity, "stopping process");
        process.stop();
        Ok(())
    }

    /// Stop the watcher, then every registered process, then release
    /// resources.
    ///
    /// Every process is attempted even if some fail or panic; the failures are
    /// logged and returned together once the sweep is done. Processes already
    /// `Stopping` or `Stopped` are skipped. No events are emitted since the
    /// watcher is gone.
    pub fn stop_all(&self) -> Result<(), SupervisorError> {
        self.finish_watcher();

        let mut failures = Vec::new();
        for process in self.shared.snapshot() {
            let identity = process.identity();
            let lifecycle = self.shared.lifecycle(identity);
            // Stopping means another caller is already taking it down
            if matches!(
                lifecycle.state(),
                LifecycleState::Stopping | LifecycleState::Stopped
            ) {
                continue;
            }
            let stopped = panic::catch_unwind(AssertUnwindSafe(|| self.stop(&process)))
                .unwrap_or_else(|_| {
                    Err(SupervisorError::StopPanicked {
                        identity: identity.clone(),
                    })
                });
            match stopped {
                Ok(()) => {
                    lifecycle.force_stopped();
                }
                Err(e) => {
                    warn!(process = %identity, error = %e, "failed to stop process");
                    failures.push(e);
                }
            }
        }
        self.shared.clear();

        self.release();
        if let Some(slot) = self.context.own_slot() {
            if let Err(e) = self.shared.channels.reset(slot) {
                warn!(slot, error = %e, "failed to reset supervisor signal slot");
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SupervisorError::Incomplete { failures })
        }
    }

    /// Append a listener. Listeners are never removed.
    pub fn register(&self, listener: Arc<dyn ChangeListener>) {
        self.shared.listeners.push(listener);
        debug!(listeners = self.shared.listeners.len(), "registered change listener");
    }

    /// Stop the watcher and release resources, leaving children running.
    pub fn close(&self) {
        self.finish_watcher();
        self.release();
    }

    fn finish_watcher(&self) {
        let watcher = self.watcher.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(watcher) = watcher {
            watcher.finish();
        }
    }

    fn release(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.launcher.close();
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.close();
    }
}

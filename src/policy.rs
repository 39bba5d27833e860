//! Group policy acting on change events
//!
//! The supervisor only reports stop and restart requests. `GroupPolicy`
//! decides what they mean for a whole group: a restart request stops the
//! process and starts it again once it is observed stopped, a stop request
//! ends supervision of the group.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::models::{
    ChangeEvent, ChangeEventKind, CommandDescriptor, LifecycleState, ProcessIdentity,
};
use crate::supervisor::{StartOutcome, Supervisor};

/// How long a restart waits for the lifecycle to catch up with a `Stopped` event.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

const RECEIVE_INTERVAL: Duration = Duration::from_millis(200);

/// What the event loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Restart and shutdown policy for one group of processes.
pub struct GroupPolicy<'a> {
    supervisor: &'a Supervisor,
    commands: Vec<CommandDescriptor>,
    by_identity: HashMap<ProcessIdentity, usize>,
    pending_restarts: HashSet<ProcessIdentity>,
    settle_timeout: Duration,
}

impl<'a> GroupPolicy<'a> {
    pub fn new(supervisor: &'a Supervisor, commands: Vec<CommandDescriptor>) -> Self {
        let by_identity = commands
            .iter()
            .enumerate()
            .map(|(index, c)| (c.identity.clone(), index))
            .collect();
        Self {
            supervisor,
            commands,
            by_identity,
            pending_restarts: HashSet::new(),
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }

    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    pub fn pending_restarts(&self) -> usize {
        self.pending_restarts.len()
    }

    /// Start every command in declaration order.
    pub fn start_all(&self) {
        for command in &self.commands {
            self.start(command.clone());
        }
    }

    /// Handle events until `running` is lowered, the channel disconnects, or
    /// an event ends supervision.
    pub fn run(&mut self, events: &Receiver<ChangeEvent>, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            let event = match events.recv_timeout(RECEIVE_INTERVAL) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if self.on_event(&event) == Flow::Shutdown {
                break;
            }
        }
    }

    pub fn on_event(&mut self, event: &ChangeEvent) -> Flow {
        let identity = event.identity();
        match event.kind() {
            ChangeEventKind::StopRequested => {
                info!(process = %identity, "shutdown requested");
                Flow::Shutdown
            }
            ChangeEventKind::RestartRequested => {
                self.request_restart(identity);
                Flow::Continue
            }
            ChangeEventKind::Stopped => {
                if self.pending_restarts.remove(identity) {
                    self.restart(identity);
                    Flow::Continue
                } else if self.pending_restarts.is_empty() && self.all_stopped(identity) {
                    info!("every process has stopped");
                    Flow::Shutdown
                } else {
                    Flow::Continue
                }
            }
            _ => Flow::Continue,
        }
    }

    fn request_restart(&mut self, identity: &ProcessIdentity) {
        let process = self
            .supervisor
            .processes()
            .into_iter()
            .find(|p| p.identity() == identity);
        let Some(process) = process else {
            warn!(process = %identity, "restart requested for unknown process");
            return;
        };
        match self.supervisor.stop(&process) {
            Ok(()) => {
                self.pending_restarts.insert(identity.clone());
            }
            Err(e) => warn!(process = %identity, error = %e, "restart ignored"),
        }
    }

    fn restart(&self, identity: &ProcessIdentity) {
        // The event precedes the lifecycle move
        if !self.settle(identity) {
            warn!(process = %identity, "process did not settle as stopped");
        }
        match self.by_identity.get(identity) {
            Some(&index) => self.start(self.commands[index].clone()),
            None => warn!(process = %identity, "no command to restart"),
        }
    }

    fn settle(&self, identity: &ProcessIdentity) -> bool {
        let deadline = Instant::now() + self.settle_timeout;
        while self.supervisor.state_of(identity) != Some(LifecycleState::Stopped) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }

    fn all_stopped(&self, just_stopped: &ProcessIdentity) -> bool {
        self.by_identity.keys().all(|id| {
            id == just_stopped || self.supervisor.state_of(id) == Some(LifecycleState::Stopped)
        })
    }

    fn start(&self, command: CommandDescriptor) {
        let identity = command.identity.clone();
        match self.supervisor.start(command) {
            Ok(StartOutcome::Launched(process)) => {
                info!(process = %identity, pid = ?process.pid(), "launched");
            }
            Ok(StartOutcome::Failed { reason, .. }) => {
                error!(process = %identity, error = %reason, "unable to start");
            }
            Err(e) => {
                error!(process = %identity, error = %e, "start rejected");
            }
        }
    }
}

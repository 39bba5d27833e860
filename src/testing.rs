//! In-memory fakes for the process and signal channel seams

use std::collections::HashMap;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::{CommandDescriptor, ProcessIdentity};
use crate::process::{LaunchError, Launcher, ManagedProcess, ProcessHandle};
use crate::signals::{SignalChannel, SignalChannels};

#[derive(Default)]
struct Flags {
    up: AtomicBool,
    operational: AtomicBool,
    stop: AtomicBool,
    restart: AtomicBool,
}

/// Signal channel whose flags are flipped directly by the test.
#[derive(Clone, Default)]
pub struct FakeChannel {
    flags: Arc<Flags>,
}

impl FakeChannel {
    pub fn with_up() -> Self {
        let channel = Self::default();
        channel.set_up(true);
        channel
    }

    pub fn with_operational() -> Self {
        let channel = Self::default();
        channel.set_operational(true);
        channel
    }

    pub fn with_stop() -> Self {
        let channel = Self::default();
        channel.set_stop(true);
        channel
    }

    pub fn with_restart() -> Self {
        let channel = Self::default();
        channel.set_restart(true);
        channel
    }

    pub fn set_up(&self, value: bool) {
        self.flags.up.store(value, Ordering::SeqCst);
    }

    pub fn set_operational(&self, value: bool) {
        self.flags.operational.store(value, Ordering::SeqCst);
    }

    pub fn set_stop(&self, value: bool) {
        self.flags.stop.store(value, Ordering::SeqCst);
    }

    pub fn set_restart(&self, value: bool) {
        self.flags.restart.store(value, Ordering::SeqCst);
    }

    pub fn set_all(&self, value: bool) {
        self.set_up(value);
        self.set_operational(value);
        self.set_stop(value);
        self.set_restart(value);
    }
}

impl SignalChannel for FakeChannel {
    fn is_up(&self) -> bool {
        self.flags.up.load(Ordering::SeqCst)
    }

    fn is_operational(&self) -> bool {
        self.flags.operational.load(Ordering::SeqCst)
    }

    fn asked_for_stop(&self) -> bool {
        self.flags.stop.load(Ordering::SeqCst)
    }

    fn asked_for_restart(&self) -> bool {
        self.flags.restart.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct HandleState {
    alive: AtomicBool,
    fail_liveness: AtomicBool,
    fail_wait: AtomicBool,
    panic_on_liveness: AtomicBool,
    signals: AtomicUsize,
    streams_closed: AtomicBool,
}

/// Process handle that dies as soon as it receives a termination signal.
#[derive(Clone)]
pub struct FakeHandle {
    state: Arc<HandleState>,
}

impl FakeHandle {
    pub fn alive() -> Self {
        let handle = Self {
            state: Arc::new(HandleState::default()),
        };
        handle.set_alive(true);
        handle
    }

    pub fn set_alive(&self, value: bool) {
        self.state.alive.store(value, Ordering::SeqCst);
    }

    pub fn fail_liveness(&self, value: bool) {
        self.state.fail_liveness.store(value, Ordering::SeqCst);
    }

    pub fn panic_on_liveness(&self, value: bool) {
        self.state.panic_on_liveness.store(value, Ordering::SeqCst);
    }

    pub fn fail_wait(&self, value: bool) {
        self.state.fail_wait.store(value, Ordering::SeqCst);
    }

    pub fn termination_signals(&self) -> usize {
        self.state.signals.load(Ordering::SeqCst)
    }

    pub fn streams_closed(&self) -> bool {
        self.state.streams_closed.load(Ordering::SeqCst)
    }
}

impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn is_alive(&self) -> io::Result<bool> {
        if self.state.panic_on_liveness.load(Ordering::SeqCst) {
            panic!("liveness check exploded");
        }
        if self.state.fail_liveness.load(Ordering::SeqCst) {
            return Err(io::Error::other("liveness check failed"));
        }
        Ok(self.state.alive.load(Ordering::SeqCst))
    }

    fn send_termination_signal(&self) -> io::Result<()> {
        self.state.signals.fetch_add(1, Ordering::SeqCst);
        self.set_alive(false);
        Ok(())
    }

    fn wait_for_exit(&self) -> io::Result<ExitStatus> {
        if self.state.fail_wait.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        Ok(ExitStatus::from_raw(0))
    }

    fn close_streams(&self) {
        self.state.streams_closed.store(true, Ordering::SeqCst);
    }
}

/// Slot allocator recording every reset.
#[derive(Default)]
pub struct FakeChannels {
    resets: Mutex<Vec<u32>>,
    closed: AtomicBool,
}

impl FakeChannels {
    pub fn resets_of(&self, slot: u32) -> usize {
        self.resets
            .lock()
            .unwrap()
            .iter()
            .filter(|s| **s == slot)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl SignalChannels for FakeChannels {
    fn create_after_clean(&self, _slot: u32) -> io::Result<Box<dyn SignalChannel>> {
        Ok(Box::new(FakeChannel::default()))
    }

    fn reset(&self, slot: u32) -> io::Result<()> {
        self.resets.lock().unwrap().push(slot);
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher handing out fake processes; keys listed in `failing` fail.
#[derive(Default)]
pub struct FakeLauncher {
    failing: Mutex<Vec<String>>,
    launched: Mutex<HashMap<ProcessIdentity, (FakeHandle, FakeChannel)>>,
    closes: AtomicUsize,
}

impl FakeLauncher {
    pub fn fail_key(&self, key: &str) {
        self.failing.lock().unwrap().push(key.to_string());
    }

    pub fn handle(&self, identity: &ProcessIdentity) -> FakeHandle {
        self.launched.lock().unwrap()[identity].0.clone()
    }

    pub fn channel(&self, identity: &ProcessIdentity) -> FakeChannel {
        self.launched.lock().unwrap()[identity].1.clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, command: &CommandDescriptor) -> Result<ManagedProcess, LaunchError> {
        let identity = command.identity.clone();
        if self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|k| k == identity.key())
        {
            return Err(LaunchError::Spawn {
                identity,
                program: command.program.clone(),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }

        let handle = FakeHandle::alive();
        let channel = FakeChannel::default();
        self.launched
            .lock()
            .unwrap()
            .insert(identity.clone(), (handle.clone(), channel.clone()));
        Ok(ManagedProcess::new(
            identity,
            Box::new(handle),
            Box::new(channel),
            None,
        ))
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

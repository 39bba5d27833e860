//! Shared helpers for driving real child processes

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use procwarden::models::{ChangeEvent, ChangeEventKind, CommandDescriptor, LifecycleState};
use procwarden::{ProcessIdentity, Supervisor, SupervisorContext};
use tempfile::TempDir;

/// Reads the shared dir and slot index from the properties file (`$0`).
pub const READ_SLOT: &str = r#"SHARED=$(sed -n 's/^process.sharedDir=//p' "$0")
IDX=$(sed -n 's/^process.index=//p' "$0")
"#;

pub const RAISE_UP: &str = "touch \"$SHARED/slot-$IDX/up\"\n";

pub const LOOP_FOREVER: &str = "while true; do sleep 0.05; done\n";

pub struct Harness {
    pub supervisor: Supervisor,
    pub events: Arc<Mutex<Vec<ChangeEvent>>>,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let context =
            SupervisorContext::new(dir.path()).with_poll_interval(Duration::from_millis(20));
        let supervisor = Supervisor::new(context).expect("Failed to create supervisor");

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        supervisor.register(Arc::new(move |event: &ChangeEvent| {
            sink.lock().unwrap().push(event.clone());
        }));

        Self {
            supervisor,
            events,
            _dir: dir,
        }
    }

    pub fn kinds_of(&self, identity: &ProcessIdentity) -> Vec<ChangeEventKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.identity() == identity)
            .map(|e| e.kind())
            .collect()
    }

    /// Wait until `identity` has seen an event of `kind`.
    pub fn await_event(&self, identity: &ProcessIdentity, kind: ChangeEventKind) {
        let found = wait_until(Duration::from_secs(10), || {
            self.kinds_of(identity).contains(&kind)
        });
        assert!(
            found,
            "{identity} never emitted {kind:?}, saw {:?}",
            self.kinds_of(identity)
        );
    }

    pub fn await_state(&self, identity: &ProcessIdentity, state: LifecycleState) {
        let found = wait_until(Duration::from_secs(10), || {
            self.supervisor.state_of(identity) == Some(state)
        });
        assert!(
            found,
            "{identity} never reached {state}, is {:?}",
            self.supervisor.state_of(identity)
        );
    }
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// A `/bin/sh -c <script>` command; the properties file lands in `$0`.
pub fn shell(key: &str, slot: u32, script: &str) -> CommandDescriptor {
    CommandDescriptor::new(ProcessIdentity::new(key, slot), "/bin/sh")
        .with_option("-c")
        .with_option(script)
}

//! Explicit runtime context handed to the supervisor and its launcher

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

/// Delay between two watcher ticks. Lower values detect phase changes sooner
/// at the cost of more filesystem and process-table queries per second.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Time children are told they have to shut down after a termination signal.
pub const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Signal slot reserved for the supervisor itself.
pub const DEFAULT_OWN_SLOT: u32 = 0;

/// Shared directory, timings and own slot of one supervisor instance.
#[derive(Debug, Clone)]
pub struct SupervisorContext {
    shared_dir: PathBuf,
    poll_interval: Duration,
    termination_timeout: Duration,
    own_slot: Option<u32>,
    // Keeps a generated shared directory alive as long as any clone
    _temp_dir: Option<Arc<TempDir>>,
}

impl SupervisorContext {
    pub fn new(shared_dir: impl Into<PathBuf>) -> Self {
        Self {
            shared_dir: shared_dir.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
            own_slot: Some(DEFAULT_OWN_SLOT),
            _temp_dir: None,
        }
    }

    /// Context rooted at a fresh private directory, removed on drop.
    pub fn temporary() -> io::Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("procwarden-").tempdir()?;
        let mut context = Self::new(temp_dir.path());
        context._temp_dir = Some(Arc::new(temp_dir));
        Ok(context)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_termination_timeout(mut self, timeout: Duration) -> Self {
        self.termination_timeout = timeout;
        self
    }

    pub fn with_own_slot(mut self, slot: Option<u32>) -> Self {
        self.own_slot = slot;
        self
    }

    pub fn shared_dir(&self) -> &Path {
        &self.shared_dir
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn termination_timeout(&self) -> Duration {
        self.termination_timeout
    }

    pub fn own_slot(&self) -> Option<u32> {
        self.own_slot
    }
}

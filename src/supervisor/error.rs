use std::io;

use thiserror::Error;

use crate::models::{LifecycleState, ProcessIdentity};

/// Errors reported to callers of the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Can not start multiple times {identity}")]
    DuplicateStart { identity: ProcessIdentity },

    #[error("Can not move {identity} from {from} to {to}")]
    IllegalTransition {
        identity: ProcessIdentity,
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("{identity} is not a registered process")]
    NotRegistered { identity: ProcessIdentity },

    #[error("Stopping {identity} panicked")]
    StopPanicked { identity: ProcessIdentity },

    #[error("Supervisor is closed")]
    Closed,

    #[error("Failed to spawn state watcher thread")]
    WatcherSpawn(#[source] io::Error),

    #[error("{} process(es) failed to stop", .failures.len())]
    Incomplete { failures: Vec<SupervisorError> },
}

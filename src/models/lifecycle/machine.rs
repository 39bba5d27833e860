//! Lock-guarded lifecycle record for one process identity

use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use super::types::LifecycleState;

/// Compare-and-move state machine.
///
/// Both the caller thread (start/stop) and the watcher thread move the same
/// lifecycle, so every read and write goes through the internal mutex.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Init),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.lock()
    }

    /// Move to `to` if the transition table allows it.
    ///
    /// Returns `false` and leaves the state untouched otherwise, so repeated
    /// illegal calls are harmless.
    pub fn try_move_to(&self, to: LifecycleState) -> bool {
        let mut state = self.lock();
        let from = *state;
        let moved = from.can_transition_to(&to);
        if moved {
            *state = to;
        }
        trace!(%from, %to, moved, "lifecycle move attempt");
        moved
    }

    /// Walk through `Stopping` when needed to land on `Stopped`.
    ///
    /// Used when an exit is observed or a launch fails: the process is gone
    /// regardless of which transition was in flight. `Init` cannot reach
    /// `Stopped` and is left alone.
    pub fn force_stopped(&self) -> bool {
        let mut state = self.lock();
        let from = *state;
        if matches!(from, LifecycleState::Starting | LifecycleState::Started) {
            *state = LifecycleState::Stopping;
        }
        let moved = state.can_transition_to(&LifecycleState::Stopped);
        if moved {
            *state = LifecycleState::Stopped;
        }
        trace!(%from, to = %LifecycleState::Stopped, moved, "lifecycle forced stop");
        moved
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        // The guarded value is a plain enum; a panic elsewhere cannot leave it torn.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

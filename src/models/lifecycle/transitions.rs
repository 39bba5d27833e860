use anyhow::{bail, Result};

use super::types::LifecycleState;

impl LifecycleState {
    /// Check if transitioning from the current state to the new state is valid.
    ///
    /// Valid transitions:
    /// - `Init` -> `Starting`
    /// - `Starting` -> `Started` | `Stopping`
    /// - `Started` -> `Stopping`
    /// - `Stopping` -> `Stopped`
    /// - `Stopped` is a terminal state
    ///
    /// Moving a state onto itself is never valid.
    pub fn can_transition_to(&self, new_state: &LifecycleState) -> bool {
        match self {
            LifecycleState::Init => matches!(new_state, LifecycleState::Starting),
            LifecycleState::Starting => {
                matches!(new_state, LifecycleState::Started | LifecycleState::Stopping)
            }
            LifecycleState::Started => matches!(new_state, LifecycleState::Stopping),
            LifecycleState::Stopping => matches!(new_state, LifecycleState::Stopped),
            LifecycleState::Stopped => false, // Terminal state
        }
    }

    /// Attempt to transition to a new state, returning an error if invalid.
    pub fn try_transition(&self, new_state: LifecycleState) -> Result<LifecycleState> {
        if self.can_transition_to(&new_state) {
            Ok(new_state)
        } else {
            bail!("Invalid lifecycle transition: {self} -> {new_state}")
        }
    }

    /// Returns the list of valid states this state can transition to.
    pub fn valid_transitions(&self) -> Vec<LifecycleState> {
        match self {
            LifecycleState::Init => vec![LifecycleState::Starting],
            LifecycleState::Starting => vec![LifecycleState::Started, LifecycleState::Stopping],
            LifecycleState::Started => vec![LifecycleState::Stopping],
            LifecycleState::Stopping => vec![LifecycleState::Stopped],
            LifecycleState::Stopped => vec![], // Terminal state
        }
    }
}

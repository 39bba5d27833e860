use crate::models::lifecycle::{Lifecycle, LifecycleState};

/// Drive a fresh lifecycle into `state` through legal moves only.
fn lifecycle_in(state: LifecycleState) -> Lifecycle {
    let lifecycle = Lifecycle::new();
    let path: &[LifecycleState] = match state {
        LifecycleState::Init => &[],
        LifecycleState::Starting => &[LifecycleState::Starting],
        LifecycleState::Started => &[LifecycleState::Starting, LifecycleState::Started],
        LifecycleState::Stopping => &[LifecycleState::Starting, LifecycleState::Stopping],
        LifecycleState::Stopped => &[
            LifecycleState::Starting,
            LifecycleState::Stopping,
            LifecycleState::Stopped,
        ],
    };
    for step in path {
        assert!(lifecycle.try_move_to(*step), "setup move to {step} failed");
    }
    assert_eq!(lifecycle.state(), state);
    lifecycle
}

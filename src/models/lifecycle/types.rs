/// Authoritative lifecycle state of a supervised process.
///
/// State machine transitions:
/// - `Init` -> `Starting` (supervisor accepted a start request)
/// - `Starting` -> `Started` | `Stopping` (child reported up, or stop requested early)
/// - `Started` -> `Stopping` (stop requested)
/// - `Stopping` -> `Stopped` (exit observed)
/// - `Stopped` is a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Init,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 5] = [
        LifecycleState::Init,
        LifecycleState::Starting,
        LifecycleState::Started,
        LifecycleState::Stopping,
        LifecycleState::Stopped,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Stopped)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Init => write!(f, "Init"),
            LifecycleState::Starting => write!(f, "Starting"),
            LifecycleState::Started => write!(f, "Started"),
            LifecycleState::Stopping => write!(f, "Stopping"),
            LifecycleState::Stopped => write!(f, "Stopped"),
        }
    }
}

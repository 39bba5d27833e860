//! Lifecycle events broadcast by the supervisor

use super::identity::ProcessIdentity;

/// What happened to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEventKind {
    /// Child announced it is up
    Started,
    /// Child announced it is fully operational
    Operational,
    /// Child exited or could not be found alive
    Stopped,
    /// Child asked to be restarted
    RestartRequested,
    /// Child asked for the group to be stopped
    StopRequested,
    /// Launch failed before the child ever ran
    UnableToStart,
}

impl std::fmt::Display for ChangeEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeEventKind::Started => write!(f, "Started"),
            ChangeEventKind::Operational => write!(f, "Operational"),
            ChangeEventKind::Stopped => write!(f, "Stopped"),
            ChangeEventKind::RestartRequested => write!(f, "RestartRequested"),
            ChangeEventKind::StopRequested => write!(f, "StopRequested"),
            ChangeEventKind::UnableToStart => write!(f, "UnableToStart"),
        }
    }
}

/// A single lifecycle notification. Two events with the same identity and
/// kind are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    identity: ProcessIdentity,
    kind: ChangeEventKind,
}

impl ChangeEvent {
    pub fn new(identity: ProcessIdentity, kind: ChangeEventKind) -> Self {
        Self { identity, kind }
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    pub fn kind(&self) -> ChangeEventKind {
        self.kind
    }
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.identity, self.kind)
    }
}

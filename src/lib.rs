pub mod config;
pub mod models;
pub mod policy;
pub mod process;
pub mod signals;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use models::{ChangeEvent, ChangeEventKind, CommandDescriptor, LifecycleState, ProcessIdentity};
pub use process::{LaunchError, ManagedProcess, ObservedPhase};
pub use supervisor::{
    ChangeListener, ChannelListener, LoggingListener, StartOutcome, Supervisor, SupervisorContext,
    SupervisorError,
};

//! Process group supervisor
//!
//! Launches children, tracks each one's observed phase with a single polling
//! watcher thread, guards the authoritative lifecycle with a per-identity
//! state machine and broadcasts change events to registered listeners.
//!
//! ```text
//! start(cmd) ─► Lifecycle: Init → Starting ─► Launcher ─► ManagedProcess
//!                                                              │ registered
//!                     StateWatcher (every poll_interval) ◄─────┘
//!                       observed_phase() changed?
//!                         ├─ emit ChangeEvent to listeners
//!                         └─ then move the Lifecycle
//! ```

mod context;
mod core;
mod error;
mod listeners;
mod watcher;


pub use context::{
    SupervisorContext, DEFAULT_OWN_SLOT, DEFAULT_POLL_INTERVAL, DEFAULT_TERMINATION_TIMEOUT,
};
pub use core::{StartOutcome, Supervisor};
pub use error::SupervisorError;
pub use listeners::{ChangeListener, ChannelListener, LoggingListener};

//! Out-of-band signal channel between the supervisor and its children
//!
//! A child announces its lifecycle by raising boolean flags in a slot it
//! shares with the supervisor. The supervisor only ever reads them, and wipes
//! a slot when a process is launched into it or has exited.

mod file;

pub use file::{FileSignalChannels, SignalFlag};

use std::io;

/// The four flags a child can raise in its slot.
pub trait SignalChannel: Send + Sync {
    fn is_up(&self) -> bool;
    fn is_operational(&self) -> bool;
    fn asked_for_stop(&self) -> bool;
    fn asked_for_restart(&self) -> bool;
}

/// Allocator for signal channel slots rooted at one shared base directory.
pub trait SignalChannels: Send + Sync {
    /// Clear any stale flags left in `slot` by a previous run and hand out a
    /// reader for it.
    fn create_after_clean(&self, slot: u32) -> io::Result<Box<dyn SignalChannel>>;

    /// Lower every flag in `slot`.
    fn reset(&self, slot: u32) -> io::Result<()>;

    /// Release every slot allocated through this instance.
    fn close(&self) -> io::Result<()>;
}

//! Flag-file implementation of the signal channel
//!
//! Layout: `<base>/slot-<index>/{up,operational,stop,restart}`. A flag is
//! raised when its file exists, so children only need to create an empty file.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::{SignalChannel, SignalChannels};

/// A flag a child raises in its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalFlag {
    Up,
    Operational,
    AskForStop,
    AskForRestart,
}

impl SignalFlag {
    pub const ALL: [SignalFlag; 4] = [
        SignalFlag::Up,
        SignalFlag::Operational,
        SignalFlag::AskForStop,
        SignalFlag::AskForRestart,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            SignalFlag::Up => "up",
            SignalFlag::Operational => "operational",
            SignalFlag::AskForStop => "stop",
            SignalFlag::AskForRestart => "restart",
        }
    }
}

/// Slot allocator backed by a directory tree under a shared base directory.
#[derive(Debug)]
pub struct FileSignalChannels {
    base_dir: PathBuf,
    allocated: Mutex<BTreeSet<u32>>,
}

impl FileSignalChannels {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            allocated: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn slot_dir(&self, slot: u32) -> PathBuf {
        slot_dir(&self.base_dir, slot)
    }

    /// Raise a flag in `slot`, the same way a child would.
    pub fn raise(&self, slot: u32, flag: SignalFlag) -> io::Result<()> {
        let dir = self.slot_dir(slot);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(flag.file_name()), b"")
    }

    pub fn is_raised(&self, slot: u32, flag: SignalFlag) -> bool {
        self.slot_dir(slot).join(flag.file_name()).exists()
    }

    fn clear(&self, slot: u32) -> io::Result<()> {
        let dir = self.slot_dir(slot);
        for flag in SignalFlag::ALL {
            // Ignore NotFound: a lowered flag is the goal
            if let Err(e) = fs::remove_file(dir.join(flag.file_name())) {
                if e.kind() != io::ErrorKind::NotFound {
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

/// Directory holding the flags of `slot` under `base_dir`.
pub fn slot_dir(base_dir: &Path, slot: u32) -> PathBuf {
    base_dir.join(format!("slot-{slot}"))
}

impl SignalChannels for FileSignalChannels {
    fn create_after_clean(&self, slot: u32) -> io::Result<Box<dyn SignalChannel>> {
        let dir = self.slot_dir(slot);
        fs::create_dir_all(&dir)?;
        self.clear(slot)?;
        self.allocated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(slot);
        debug!(slot, dir = %dir.display(), "allocated signal slot");
        Ok(Box::new(FileSignalChannel { dir }))
    }

    fn reset(&self, slot: u32) -> io::Result<()> {
        debug!(slot, "resetting signal slot");
        self.clear(slot)
    }

    fn close(&self) -> io::Result<()> {
        let slots: Vec<u32> = std::mem::take(
            &mut *self.allocated.lock().unwrap_or_else(|e| e.into_inner()),
        )
        .into_iter()
        .collect();

        let mut first_error = None;
        for slot in slots {
            if let Err(e) = fs::remove_dir_all(self.slot_dir(slot)) {
                if e.kind() != io::ErrorKind::NotFound && first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Reader over one slot directory.
#[derive(Debug)]
struct FileSignalChannel {
    dir: PathBuf,
}

impl FileSignalChannel {
    fn flag(&self, flag: SignalFlag) -> bool {
        self.dir.join(flag.file_name()).exists()
    }
}

impl SignalChannel for FileSignalChannel {
    fn is_up(&self) -> bool {
        self.flag(SignalFlag::Up)
    }

    fn is_operational(&self) -> bool {
        self.flag(SignalFlag::Operational)
    }

    fn asked_for_stop(&self) -> bool {
        self.flag(SignalFlag::AskForStop)
    }

    fn asked_for_restart(&self) -> bool {
        self.flag(SignalFlag::AskForRestart)
    }
}

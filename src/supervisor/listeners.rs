//! Change event listeners

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{error, info};

use crate::models::ChangeEvent;

/// Receives lifecycle events, synchronously, on the thread that emits them.
pub trait ChangeListener: Send + Sync {
    fn on_change_event(&self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_change_event(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// Logs every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ChangeListener for LoggingListener {
    fn on_change_event(&self, event: &ChangeEvent) {
        info!(process = %event.identity(), kind = %event.kind(), "process lifecycle event");
    }
}

/// Forwards events to a channel so another thread can act on them.
#[derive(Debug)]
pub struct ChannelListener {
    sender: Mutex<Sender<ChangeEvent>>,
}

impl ChannelListener {
    pub fn new() -> (Self, Receiver<ChangeEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }
}

impl ChangeListener for ChannelListener {
    fn on_change_event(&self, event: &ChangeEvent) {
        // A dropped receiver just means nobody is interested anymore
        let _ = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(event.clone());
    }
}

/// Append-only listener registry.
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl ListenerSet {
    pub(crate) fn push(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// A panicking listener is logged and skipped; the others still run.
    pub(crate) fn emit(&self, event: &ChangeEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| listener.on_change_event(event)));
            if delivered.is_err() {
                error!(event = %event, "change listener panicked");
            }
        }
    }
}

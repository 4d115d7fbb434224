//! Cancellation signal
//!
//! A `CancelSource` owns the only `Sender` of a channel nobody ever sends on.
//! Cancelling drops that sender, which disconnects every receiver at once, so
//! a token can sit in a `select!` next to real work and wake immediately.

use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

/// Fires a single cancellation signal
#[derive(Debug)]
pub struct CancelSource {
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            rx: self.rx.clone(),
        }
    }

    /// Signal cancellation. Later calls are no-ops.
    pub fn cancel(&self) {
        self.tx.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observes a [`CancelSource`]
#[derive(Debug, Clone)]
pub struct CancellationToken {
    rx: Receiver<()>,
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that becomes ready (disconnected) on cancellation
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    /// Sleep up to `timeout`; returns true if cancelled meanwhile
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            _ => true,
        }
    }
}

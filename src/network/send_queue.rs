//! Double-buffered send queue
//!
//! Producers append to the front buffer. A flush swaps front and back and
//! publishes the queue to the sender role; one worker then drains the back
//! buffer while producers keep appending to the front.
//!
//! ```text
//!  producers ──enqueue──▶ front ─┐
//!                                │ trigger_flush (swap + publish)
//!  worker    ◀──take_back── back ◀┘
//! ```

use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::Connection;
use crate::error::{RelayError, Result};
use crate::protocol::Packet;
use crate::sender::SenderHandle;

#[derive(Debug, Default)]
struct Buffers {
    front: Vec<Packet>,
    back: Vec<Packet>,
    /// Queue is published or being drained
    flush_pending: bool,
    /// A flush was requested while one was pending
    reflush: bool,
    disposed: bool,
}

/// Per-connection outbound mailbox
pub struct SendQueue {
    name: String,
    owner: Weak<Connection>,
    dispatch: SenderHandle,
    max_size: usize,
    buffers: Mutex<Buffers>,
}

impl SendQueue {
    pub fn new(
        name: impl Into<String>,
        owner: Weak<Connection>,
        dispatch: SenderHandle,
        max_size: usize,
    ) -> Self {
        Self {
            name: name.into(),
            owner,
            dispatch,
            max_size,
            buffers: Mutex::new(Buffers::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning connection, if it still exists
    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.owner.upgrade()
    }

    /// Append a packet to the front buffer
    pub fn enqueue(&self, packet: Packet) -> Result<()> {
        let mut buffers = self.buffers.lock();
        if buffers.disposed {
            return Err(RelayError::QueueDisposed(self.name.clone()));
        }
        if buffers.front.len() >= self.max_size {
            return Err(RelayError::QueueOverflow {
                queue: self.name.clone(),
                limit: self.max_size,
            });
        }
        buffers.front.push(packet);
        Ok(())
    }

    /// Swap buffers and hand the queue to the sender role.
    ///
    /// No-op when the front buffer is empty. While a flush is outstanding the
    /// request is remembered and served as soon as that flush completes.
    /// Returns true if the queue was published.
    pub fn trigger_flush(self: &Arc<Self>) -> bool {
        {
            let mut buffers = self.buffers.lock();
            if buffers.disposed {
                return false;
            }
            if buffers.flush_pending {
                buffers.reflush |= !buffers.front.is_empty();
                return false;
            }
            if !Self::swap(&mut buffers) {
                return false;
            }
        }
        self.publish()
    }

    /// Move front into back; false if there is nothing to send
    fn swap(buffers: &mut Buffers) -> bool {
        if buffers.front.is_empty() {
            return false;
        }
        let Buffers { front, back, .. } = buffers;
        mem::swap(front, back);
        buffers.flush_pending = true;
        buffers.reflush = false;
        true
    }

    fn publish(self: &Arc<Self>) -> bool {
        if self.dispatch.trigger_queue_clear(Arc::clone(self)) {
            return true;
        }
        tracing::debug!("Sender role gone, dropping flush of queue '{}'", self.name);
        let mut buffers = self.buffers.lock();
        buffers.back.clear();
        buffers.flush_pending = false;
        false
    }

    /// Take the back buffer for draining
    pub fn take_back(&self) -> Vec<Packet> {
        mem::take(&mut self.buffers.lock().back)
    }

    /// Return the drained buffer and end the outstanding flush.
    ///
    /// Starts the next flush right away if one was requested meanwhile.
    pub fn complete_flush(self: &Arc<Self>, mut drained: Vec<Packet>) {
        drained.clear();
        let republish = {
            let mut buffers = self.buffers.lock();
            if buffers.back.is_empty() {
                buffers.back = drained;
            }
            buffers.flush_pending = false;
            let wanted = mem::take(&mut buffers.reflush);
            !buffers.disposed && wanted && Self::swap(&mut buffers)
        };
        if republish {
            self.publish();
        }
    }

    /// Drop everything pending and refuse further packets
    pub fn dispose(&self) {
        let mut buffers = self.buffers.lock();
        buffers.disposed = true;
        buffers.front.clear();
        buffers.back.clear();
        buffers.reflush = false;
    }

    pub fn is_disposed(&self) -> bool {
        self.buffers.lock().disposed
    }

    /// Packets waiting in the front buffer
    pub fn pending(&self) -> usize {
        self.buffers.lock().front.len()
    }

    pub fn is_flush_pending(&self) -> bool {
        self.buffers.lock().flush_pending
    }
}

impl fmt::Debug for SendQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffers = self.buffers.lock();
        f.debug_struct("SendQueue")
            .field("name", &self.name)
            .field("front", &buffers.front.len())
            .field("back", &buffers.back.len())
            .field("flush_pending", &buffers.flush_pending)
            .field("disposed", &buffers.disposed)
            .finish()
    }
}

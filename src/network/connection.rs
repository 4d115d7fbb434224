//! Client connection
//!
//! Owns the socket, the per-connection string table and the TCP send queue.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{ConnectionRegistry, SendQueue, Transport};
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::protocol::{Packet, StringMap};
use crate::sender::SenderHandle;

/// Name of the TCP send queue, used in diagnostics
pub const TCP_QUEUE_NAME: &str = "tcp";

/// Unique id of a connection within a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback run once when a connection is disposed
pub type DisposeHook = Box<dyn FnOnce(&Connection) + Send>;

/// A client connection
pub struct Connection {
    /// Registry-assigned id
    id: ConnectionId,

    /// Peer address for logging
    peer: String,

    /// Socket write side, written only by the worker draining `tcp_queue`
    transport: Arc<dyn Transport>,

    /// Interned strings the peer knows about
    strings: Mutex<StringMap>,

    /// Outbound TCP packets
    tcp_queue: Arc<SendQueue>,

    disposed: AtomicBool,

    registry: Weak<ConnectionRegistry>,

    dispose_hooks: Mutex<Vec<DisposeHook>>,
}

impl Connection {
    /// Create a connection that is not tracked by any registry
    pub fn new(
        id: ConnectionId,
        peer: impl Into<String>,
        transport: Arc<dyn Transport>,
        sender: SenderHandle,
        config: &Config,
    ) -> Arc<Self> {
        Self::with_registry(id, peer.into(), transport, sender, config, Weak::new())
    }

    pub(crate) fn with_registry(
        id: ConnectionId,
        peer: String,
        transport: Arc<dyn Transport>,
        sender: SenderHandle,
        config: &Config,
        registry: Weak<ConnectionRegistry>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id,
            peer,
            transport,
            strings: Mutex::new(StringMap::new(
                config.string_map_capacity,
                config.string_promote_after,
            )),
            tcp_queue: Arc::new(SendQueue::new(
                TCP_QUEUE_NAME,
                this.clone(),
                sender,
                config.send_queue_max_size,
            )),
            disposed: AtomicBool::new(false),
            registry,
            dispose_hooks: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn strings(&self) -> &Mutex<StringMap> {
        &self.strings
    }

    pub fn tcp_queue(&self) -> &Arc<SendQueue> {
        &self.tcp_queue
    }

    /// Queue a packet and request a flush. Never blocks on I/O.
    ///
    /// A full queue means the peer cannot keep up; the connection is torn
    /// down rather than dropping packets from the middle of the stream.
    pub fn send(&self, packet: impl Into<Packet>) -> Result<()> {
        if self.is_disposed() {
            return Err(RelayError::ConnectionDisposed(self.id));
        }

        match self.tcp_queue.enqueue(packet.into()) {
            Ok(()) => {
                self.tcp_queue.trigger_flush();
                Ok(())
            }
            Err(e @ RelayError::QueueOverflow { .. }) => {
                tracing::warn!(
                    connection = %self,
                    queue = self.tcp_queue.name(),
                    "Send queue overflow, disposing connection"
                );
                self.dispose();
                Err(e)
            }
            Err(RelayError::QueueDisposed(_)) => Err(RelayError::ConnectionDisposed(self.id)),
            Err(e) => Err(e),
        }
    }

    /// Run `hook` when the connection is disposed (immediately if it already is)
    pub fn on_dispose(&self, hook: impl FnOnce(&Connection) + Send + 'static) {
        {
            let mut hooks = self.dispose_hooks.lock();
            if !self.is_disposed() {
                hooks.push(Box::new(hook));
                return;
            }
        }
        hook(self);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Tear the connection down. Idempotent.
    ///
    /// Clears the queues, closes the socket, unregisters and runs dispose
    /// hooks.
    pub fn dispose(&self) {
        {
            let _hooks = self.dispose_hooks.lock();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
        }

        tracing::debug!("Disposing connection {}", self);

        self.tcp_queue.dispose();
        self.transport.shutdown();

        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }

        let hooks = mem::take(&mut *self.dispose_hooks.lock());
        for hook in hooks {
            hook(self);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "con{} ({})", self.id, self.peer)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("disposed", &self.is_disposed())
            .field("tcp_queue", &self.tcp_queue)
            .finish()
    }
}

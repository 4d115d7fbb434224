//! Connection registry
//!
//! Process-scoped table of live connections. Passed explicitly to whatever
//! needs it; connections unregister themselves when disposed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Connection, ConnectionId, Transport};
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::protocol::{Message, PacketCodec};
use crate::sender::SenderHandle;

/// Tracks live connections by id
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    next_id: AtomicU64,
    sender: SenderHandle,
    codec: PacketCodec,
    config: Config,
}

impl ConnectionRegistry {
    pub fn new(sender: SenderHandle, config: &Config) -> Arc<Self> {
        Arc::new(Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sender,
            codec: PacketCodec::new(config.max_packet_size),
            config: config.clone(),
        })
    }

    /// Wrap a socket in a new registered connection
    pub fn open(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
        peer: impl Into<String>,
    ) -> Result<Arc<Connection>> {
        let mut connections = self.connections.write();
        if connections.len() >= self.config.max_connections {
            return Err(RelayError::ConnectionLimit(self.config.max_connections));
        }

        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let connection = Connection::with_registry(
            id,
            peer.into(),
            transport,
            self.sender.clone(),
            &self.config,
            Arc::downgrade(self),
        );
        connections.insert(id, Arc::clone(&connection));
        Ok(connection)
    }

    pub(crate) fn unregister(&self, id: ConnectionId) {
        let removed = self.connections.write().remove(&id);
        drop(removed);
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.read().keys().copied().collect();
        ids.sort();
        ids
    }

    fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    /// Send `message` to every live connection
    ///
    /// The message is serialized once and shared as a blob. Returns how many
    /// connections accepted it.
    pub fn broadcast(&self, message: &Message) -> Result<usize> {
        let blob = self.codec.preserialize(message)?;
        let mut delivered = 0;
        for connection in self.snapshot() {
            match connection.send(blob.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::debug!("Broadcast skipped {}: {}", connection, e),
            }
        }
        Ok(delivered)
    }

    /// Dispose every connection
    pub fn dispose_all(&self) {
        for connection in self.snapshot() {
            connection.dispose();
        }
    }
}

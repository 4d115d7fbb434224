//! TCP sender role
//!
//! Queues that need flushing are pushed onto one shared dispatch channel;
//! every sender worker pulls from it, so whichever worker is idle takes the
//! next queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};

use super::SenderWorker;
use crate::config::Config;
use crate::error::Result;
use crate::network::SendQueue;
use crate::pool::{Role, RoleWorker, WorkerContext};
use crate::protocol::PacketCodec;

/// Role name registered with the pool
pub const SENDER_ROLE_NAME: &str = "tcp-sender";

/// Cheap handle used by send queues to publish themselves
#[derive(Debug, Clone)]
pub struct SenderHandle {
    tx: Sender<Arc<SendQueue>>,
}

impl SenderHandle {
    /// Schedule `queue` for draining. Never blocks.
    ///
    /// Returns false if the sender role no longer exists.
    pub fn trigger_queue_clear(&self, queue: Arc<SendQueue>) -> bool {
        self.tx.send(queue).is_ok()
    }
}

/// Role whose workers write send queues to their sockets
#[derive(Debug)]
pub struct SenderRole {
    dispatch_tx: Sender<Arc<SendQueue>>,
    dispatch_rx: Receiver<Arc<SendQueue>>,
    codec: PacketCodec,
    tcp_buffer_size: usize,
    min_threads: usize,

    /// Workers currently inside `SenderWorker::process`
    busy: Arc<AtomicUsize>,
}

impl SenderRole {
    pub fn new(config: &Config) -> Arc<Self> {
        let (dispatch_tx, dispatch_rx) = unbounded();
        Arc::new(Self {
            dispatch_tx,
            dispatch_rx,
            codec: PacketCodec::new(config.max_packet_size),
            tcp_buffer_size: config.tcp_buffer_size,
            min_threads: config.sender_min_threads.max(1),
            busy: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn handle(&self) -> SenderHandle {
        SenderHandle {
            tx: self.dispatch_tx.clone(),
        }
    }

    /// Build a worker pulling from this role's dispatch channel
    pub fn new_worker(&self) -> SenderWorker {
        SenderWorker::new(
            self.dispatch_rx.clone(),
            self.codec,
            self.tcp_buffer_size,
            Arc::clone(&self.busy),
        )
    }
}

impl Role for SenderRole {
    fn name(&self) -> &str {
        SENDER_ROLE_NAME
    }

    fn min_threads(&self) -> usize {
        self.min_threads
    }

    fn max_threads(&self) -> usize {
        usize::MAX
    }

    fn create_worker(&self, _ctx: &WorkerContext) -> Result<Box<dyn RoleWorker>> {
        Ok(Box::new(self.new_worker()))
    }

    fn backlog(&self) -> usize {
        self.dispatch_rx.len()
    }

    fn busy_workers(&self) -> usize {
        self.busy.load(Ordering::Acquire)
    }
}

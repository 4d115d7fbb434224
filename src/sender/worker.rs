//! Sender worker
//!
//! Drains one send queue at a time: serialize each packet into the scratch
//! buffer, write `len (2) + bytes` into the buffered socket, flush once per
//! batch.

use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use crossbeam::channel::Receiver;

use crate::error::Result;
use crate::network::{BufferedSocket, Connection, SendQueue};
use crate::pool::{panic_message, RoleWorker, WorkerContext};
use crate::protocol::{write_frame, Packet, PacketCodec};

/// Per-thread sender state
pub struct SenderWorker {
    /// Shared dispatch channel of the sender role
    dispatch: Receiver<Arc<SendQueue>>,

    /// Socket output stream, rebound per queue
    socket: BufferedSocket,

    /// One serialized packet at a time
    scratch: BytesMut,

    codec: PacketCodec,

    /// Role-wide count of workers inside `process`
    busy: Arc<AtomicUsize>,
}

/// Marks a worker busy until dropped
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl SenderWorker {
    pub fn new(
        dispatch: Receiver<Arc<SendQueue>>,
        codec: PacketCodec,
        tcp_buffer_size: usize,
        busy: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            dispatch,
            socket: BufferedSocket::new(tcp_buffer_size),
            scratch: BytesMut::with_capacity(codec.max_packet_size()),
            codec,
            busy,
        }
    }

    /// Drain the next waiting queue, if any, without blocking
    pub fn try_process_next(&mut self) -> bool {
        match self.dispatch.try_recv() {
            Ok(queue) => {
                self.process(&queue);
                true
            }
            Err(_) => false,
        }
    }

    /// Write out a queue's back buffer and complete its flush
    ///
    /// Any failure disposes the connection: after a partial write the frame
    /// boundaries on the stream are lost. A panic while writing is contained
    /// here so the queue is never left with a flush outstanding.
    pub fn process(&mut self, queue: &Arc<SendQueue>) {
        let busy = Arc::clone(&self.busy);
        let _busy = BusyGuard::enter(&busy);
        let batch = queue.take_back();

        if let Some(connection) = queue.connection() {
            if !batch.is_empty() && !connection.is_disposed() {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| self.flush_batch(&connection, &batch)));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) if e.is_peer_closed() => {
                        tracing::debug!(
                            connection = %connection,
                            queue = queue.name(),
                            error = %e,
                            "Connection closed by peer"
                        );
                        connection.dispose();
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(
                            connection = %connection,
                            queue = queue.name(),
                            error = %e,
                            "Error flushing connection queue"
                        );
                        connection.dispose();
                    }
                    Err(payload) => {
                        tracing::error!(
                            connection = %connection,
                            queue = queue.name(),
                            "Panic while flushing connection queue: {}",
                            panic_message(payload.as_ref())
                        );
                        connection.dispose();
                    }
                }
            }
        }

        self.socket.unbind();
        queue.complete_flush(batch);
    }

    fn flush_batch(&mut self, connection: &Connection, batch: &[Packet]) -> Result<()> {
        self.socket.bind(Arc::clone(connection.transport()));
        let mut strings = connection.strings().lock();

        for packet in batch {
            self.scratch.clear();
            self.codec.encode(packet, &mut strings, &mut self.scratch)?;
            write_frame(&mut self.socket, &self.scratch)?;
        }

        self.socket.flush()?;
        Ok(())
    }
}

impl RoleWorker for SenderWorker {
    fn run(&mut self, ctx: &WorkerContext) -> Result<()> {
        while let Some(queue) = ctx.recv(&self.dispatch) {
            self.process(&queue);
        }
        Ok(())
    }
}

impl fmt::Debug for SenderWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderWorker")
            .field("socket", &self.socket)
            .field("scratch_capacity", &self.scratch.capacity())
            .finish()
    }
}

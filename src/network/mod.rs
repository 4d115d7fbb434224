//! Network Module
//!
//! Connections, their send queues and the TCP server.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Producers enqueue on a connection's send queue, never touching the socket
//! - Sender workers from the thread pool drain queues onto sockets

mod socket;
mod send_queue;
mod connection;
mod registry;
mod server;

pub use socket::{BufferedSocket, Transport};
pub use send_queue::SendQueue;
pub use connection::{Connection, ConnectionId, DisposeHook, TCP_QUEUE_NAME};
pub use registry::ConnectionRegistry;
pub use server::{Server, ShutdownHandle};

//! Sender Module
//!
//! The TCP sender role: turns flushed send queues into length-prefixed
//! frames on the connections' sockets.
//!
//! ## Flow
//! ```text
//! Connection::send ─▶ SendQueue (front) ─trigger_flush─▶ dispatch channel
//!                                                            │
//!                          SenderWorker (any idle thread) ◀──┘
//!                              │ encode ▶ frame ▶ buffered socket
//!                              └─ one flush per batch
//! ```

mod role;
mod worker;

pub use role::{SenderHandle, SenderRole, SENDER_ROLE_NAME};
pub use worker::SenderWorker;

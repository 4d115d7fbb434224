//! # relaykit
//!
//! The network send core of a multiplayer relay server:
//! - Role-based thread pool with elastic worker counts
//! - Double-buffered per-connection send queues
//! - Length-prefixed binary framing with per-connection string interning
//! - Fail-fast connection teardown on write errors
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Producers (feature layer, broadcast)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Connection::send
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │            SendQueue (front ⇄ back, per connection)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ trigger_flush
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │          Dispatch channel (shared by all senders)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │SenderWorker │   ...    │SenderWorker │   (ThreadPool role)
//!   └──────┬──────┘          └──────┬──────┘
//!          ▼                         ▼
//!   ┌─────────────────────────────────────┐
//!   │   len (2) + packet frames on TCP    │
//!   └─────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod pool;
pub mod network;
pub mod sender;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RelayError, Result};
pub use config::Config;
pub use network::{Connection, ConnectionRegistry, Server};
pub use pool::ThreadPool;
pub use protocol::{Message, Packet, Value};
pub use sender::SenderRole;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of relaykit
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

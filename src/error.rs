//! Error types for relaykit
//!
//! Provides a unified error type for all operations.

use std::io::ErrorKind;

use thiserror::Error;

use crate::network::ConnectionId;

/// Result type alias using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type for relaykit operations
#[derive(Debug, Error)]
pub enum RelayError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Packet too large: {size} bytes (max {max})")]
    PacketTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Connection {0} is disposed")]
    ConnectionDisposed(ConnectionId),

    #[error("Send queue '{0}' is disposed")]
    QueueDisposed(String),

    #[error("Send queue '{queue}' overflow (limit {limit})")]
    QueueOverflow { queue: String, limit: usize },

    #[error("Connection limit reached ({0})")]
    ConnectionLimit(usize),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Thread Pool Errors
    // -------------------------------------------------------------------------
    #[error("Thread pool error: {0}")]
    Pool(String),
}

impl RelayError {
    /// True if the error means the remote end is gone.
    ///
    /// Peer-closed sockets are routine churn: the connection is torn down
    /// without a warning.
    pub fn is_peer_closed(&self) -> bool {
        match self {
            RelayError::Io(e) => matches!(
                e.kind(),
                ErrorKind::NotConnected
                    | ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

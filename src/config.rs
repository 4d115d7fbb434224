//! Configuration for relaykit
//!
//! Centralized configuration with sensible defaults.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Main configuration for a relaykit server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Socket write timeout (milliseconds, 0 = block until done)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Largest serialized message, in bytes.
    /// Must fit the 16-bit frame length prefix.
    pub max_packet_size: usize,

    /// Size of each sender worker's socket write buffer (bytes)
    pub tcp_buffer_size: usize,

    /// Max interned strings per connection
    pub string_map_capacity: usize,

    /// How many times a string is written before it gets interned
    pub string_promote_after: u32,

    // -------------------------------------------------------------------------
    // Send Queue Configuration
    // -------------------------------------------------------------------------
    /// Max pending messages in a send queue's front buffer
    pub send_queue_max_size: usize,

    // -------------------------------------------------------------------------
    // Thread Pool Configuration
    // -------------------------------------------------------------------------
    /// Total worker threads across all roles
    pub pool_max_threads: usize,

    /// Sender workers kept alive even when idle
    pub sender_min_threads: usize,

    /// Supervisor tick (milliseconds)
    pub scale_interval_ms: u64,

    /// Dispatch backlog that makes the supervisor add a worker
    pub scale_up_backlog: usize,

    /// Idle ticks before the supervisor retires a worker
    pub scale_down_idle_ticks: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3802".to_string(),
            max_connections: 1024,
            write_timeout_ms: 0,
            max_packet_size: 4096,
            tcp_buffer_size: 16 * 1024, // 16 KB
            string_map_capacity: 1024,
            string_promote_after: 2,
            send_queue_max_size: 1000,
            pool_max_threads: 64,
            sender_min_threads: 1,
            scale_interval_ms: 100,
            scale_up_backlog: 8,
            scale_down_idle_ticks: 50,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check value bounds
    pub fn validate(&self) -> Result<()> {
        if self.max_packet_size == 0 || self.max_packet_size > u16::MAX as usize {
            return Err(RelayError::Config(format!(
                "max_packet_size must be in 1..={}, got {}",
                u16::MAX,
                self.max_packet_size
            )));
        }
        if self.tcp_buffer_size == 0 {
            return Err(RelayError::Config("tcp_buffer_size must be > 0".to_string()));
        }
        if self.string_map_capacity > u16::MAX as usize {
            return Err(RelayError::Config(format!(
                "string_map_capacity must be <= {}, got {}",
                u16::MAX,
                self.string_map_capacity
            )));
        }
        if self.send_queue_max_size == 0 {
            return Err(RelayError::Config("send_queue_max_size must be > 0".to_string()));
        }
        if self.pool_max_threads == 0 {
            return Err(RelayError::Config("pool_max_threads must be > 0".to_string()));
        }
        if self.sender_min_threads == 0 || self.sender_min_threads > self.pool_max_threads {
            return Err(RelayError::Config(format!(
                "sender_min_threads must be in 1..={}, got {}",
                self.pool_max_threads, self.sender_min_threads
            )));
        }
        if self.scale_interval_ms == 0 {
            return Err(RelayError::Config("scale_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the socket write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the maximum serialized packet size (in bytes)
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.config.max_packet_size = size;
        self
    }

    /// Set the sender socket buffer size (in bytes)
    pub fn tcp_buffer_size(mut self, size: usize) -> Self {
        self.config.tcp_buffer_size = size;
        self
    }

    /// Set the per-connection string table capacity
    pub fn string_map_capacity(mut self, capacity: usize) -> Self {
        self.config.string_map_capacity = capacity;
        self
    }

    /// Set how often a string is seen before it is interned
    pub fn string_promote_after(mut self, count: u32) -> Self {
        self.config.string_promote_after = count;
        self
    }

    /// Set the send queue limit (pending messages)
    pub fn send_queue_max_size(mut self, size: usize) -> Self {
        self.config.send_queue_max_size = size;
        self
    }

    /// Set the total thread budget of the pool
    pub fn pool_max_threads(mut self, count: usize) -> Self {
        self.config.pool_max_threads = count;
        self
    }

    /// Set the minimum number of sender workers
    pub fn sender_min_threads(mut self, count: usize) -> Self {
        self.config.sender_min_threads = count;
        self
    }

    /// Set the supervisor tick (in milliseconds)
    pub fn scale_interval_ms(mut self, ms: u64) -> Self {
        self.config.scale_interval_ms = ms;
        self
    }

    /// Set the backlog that triggers a scale-up
    pub fn scale_up_backlog(mut self, backlog: usize) -> Self {
        self.config.scale_up_backlog = backlog;
        self
    }

    /// Set the idle ticks before a scale-down
    pub fn scale_down_idle_ticks(mut self, ticks: u32) -> Self {
        self.config.scale_down_idle_ticks = ticks;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

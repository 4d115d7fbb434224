//! TCP Server
//!
//! Accepts connections, registers them and runs the sender role on the
//! thread pool.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::ConnectionRegistry;
use crate::config::Config;
use crate::error::Result;
use crate::pool::ThreadPool;
use crate::sender::SenderRole;

/// How long the accept loop sleeps when nobody is connecting
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Stops a running [`Server`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// TCP server for relaykit
pub struct Server {
    config: Config,
    listener: TcpListener,
    local_addr: SocketAddr,
    pool: ThreadPool,
    sender: Arc<SenderRole>,
    registry: Arc<ConnectionRegistry>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Bind the listener and start the sender workers
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let pool = ThreadPool::new(&config)?;
        let sender = SenderRole::new(&config);
        pool.add_role(sender.clone())?;

        let registry = ConnectionRegistry::new(sender.handle(), &config);

        tracing::info!("Listening on {}", local_addr);

        Ok(Self {
            config,
            listener,
            local_addr,
            pool,
            sender,
            registry,
            shutdown: ShutdownHandle {
                flag: Arc::new(AtomicBool::new(false)),
            },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn sender(&self) -> &Arc<SenderRole> {
        &self.sender
    }

    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the accept loop to stop
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Accept connections until shut down (blocking)
    ///
    /// On exit every connection is disposed and the pool is stopped.
    pub fn run(&self) -> Result<()> {
        while !self.shutdown.is_shutdown() {
            match self.listener.accept() {
                Ok((stream, addr)) => self.accept(stream, addr),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => tracing::error!("Error accepting connection: {}", e),
            }
        }

        tracing::info!("Server shutting down, closing {} connections", self.registry.len());
        self.registry.dispose_all();
        self.pool.shutdown();
        Ok(())
    }

    fn accept(&self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = self.configure(&stream) {
            tracing::warn!("Failed to configure socket for {}: {}", addr, e);
            return;
        }

        match self.registry.open(Arc::new(stream), addr.to_string()) {
            Ok(connection) => tracing::info!("Connection {} established", connection),
            Err(e) => tracing::warn!("Rejected connection from {}: {}", addr, e),
        }
    }

    fn configure(&self, stream: &TcpStream) -> Result<()> {
        stream.set_nonblocking(false)?;
        // Disable Nagle's algorithm, batching happens in the sender
        stream.set_nodelay(true)?;
        if self.config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(self.config.write_timeout_ms)))?;
        }
        Ok(())
    }
}

//! relaykit Server Binary
//!
//! Starts the TCP relay server and broadcasts a periodic keepalive.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use relaykit::{Config, Message, Server, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// relaykit Server
#[derive(Parser, Debug)]
#[command(name = "relaykit-server")]
#[command(about = "Multiplayer relay server send core")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:3802")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Maximum serialized packet size in bytes
    #[arg(long, default_value = "4096")]
    max_packet_size: usize,

    /// Sender socket buffer size in bytes
    #[arg(long, default_value = "16384")]
    tcp_buffer_size: usize,

    /// Total worker threads in the pool
    #[arg(short = 't', long, default_value = "64")]
    max_threads: usize,

    /// Sender workers kept running when idle
    #[arg(long, default_value = "1")]
    sender_threads: usize,

    /// Keepalive broadcast interval in milliseconds (0 disables)
    #[arg(short, long, default_value = "1000")]
    keepalive_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,relaykit=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("relaykit Server v{}", relaykit::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .max_packet_size(args.max_packet_size)
        .tcp_buffer_size(args.tcp_buffer_size)
        .pool_max_threads(args.max_threads)
        .sender_min_threads(args.sender_threads)
        .build();

    let server = match Server::bind(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler
    let handle = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        handle.shutdown();
    }) {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    if args.keepalive_ms > 0 {
        spawn_keepalive(&server, Duration::from_millis(args.keepalive_ms));
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

/// Broadcast a keepalive to every connection until shutdown
fn spawn_keepalive(server: &Server, interval: Duration) {
    let registry = server.registry().clone();
    let handle = server.shutdown_handle();

    let spawned = thread::Builder::new()
        .name("keepalive".to_string())
        .spawn(move || {
            while !handle.is_shutdown() {
                thread::sleep(interval);
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0);
                let message = Message::new("keepalive").with(Value::U64(now));
                match registry.broadcast(&message) {
                    Ok(n) if n > 0 => tracing::trace!("Keepalive sent to {} connections", n),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Keepalive broadcast failed: {}", e),
                }
            }
        });

    if let Err(e) = spawned {
        tracing::warn!("Failed to start keepalive thread: {}", e);
    }
}

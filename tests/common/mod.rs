//! Shared test helpers
//!
//! - `MockTransport`: in-memory socket with counters and fault injection
//! - `HangingTransport`: socket whose writes block until released
//! - `LogCapture`: tracing layer recording events for level assertions

#![allow(dead_code)]

use std::fmt::{self, Write as _};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use relaykit::network::Transport;
use relaykit::protocol::split_frames;
use relaykit::Config;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

// =============================================================================
// Mock Transport
// =============================================================================

/// In-memory socket
///
/// With a failure configured, accepts up to `limit` bytes in total and then
/// fails every write and flush with the given error kind.
#[derive(Debug, Default)]
pub struct MockTransport {
    written: Mutex<Vec<u8>>,
    writes: AtomicUsize,
    flushes: AtomicUsize,
    shutdowns: AtomicUsize,
    failure: Mutex<Option<(usize, io::ErrorKind)>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_after(limit: usize, kind: io::ErrorKind) -> Arc<Self> {
        let transport = Self::default();
        *transport.failure.lock() = Some((limit, kind));
        Arc::new(transport)
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    pub fn frames(&self) -> Vec<Bytes> {
        split_frames(&self.bytes()).unwrap()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut written = self.written.lock();

        if let Some((limit, kind)) = *self.failure.lock() {
            if written.len() >= limit {
                return Err(io::Error::new(kind, "injected failure"));
            }
            let n = buf.len().min(limit - written.len());
            written.extend_from_slice(&buf[..n]);
            return Ok(n);
        }

        written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&self) -> io::Result<()> {
        let failure = *self.failure.lock();
        if let Some((limit, kind)) = failure {
            if self.written.lock().len() >= limit {
                return Err(io::Error::new(kind, "injected failure"));
            }
        }
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Hanging Transport
// =============================================================================

/// Socket whose first write never returns until [`release`](Self::release)
///
/// Stands in for a peer that stopped reading with no write timeout set.
#[derive(Debug)]
pub struct HangingTransport {
    entered: AtomicBool,
    release_tx: Mutex<Option<Sender<()>>>,
    release_rx: Receiver<()>,
}

impl HangingTransport {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = bounded(0);
        Arc::new(Self {
            entered: AtomicBool::new(false),
            release_tx: Mutex::new(Some(tx)),
            release_rx: rx,
        })
    }

    /// A writer is stuck inside `write`
    pub fn is_blocked(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    /// Unblock the writer; the write then fails as a reset connection
    pub fn release(&self) {
        self.release_tx.lock().take();
    }
}

impl Transport for HangingTransport {
    fn write(&self, _buf: &[u8]) -> io::Result<usize> {
        self.entered.store(true, Ordering::SeqCst);
        let _ = self.release_rx.recv();
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "released"))
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn shutdown(&self) {
        self.release();
    }
}

/// Releases a [`HangingTransport`] when dropped, so a failing test never
/// leaves a pool blocked on join.
pub struct ReleaseOnDrop(pub Arc<HangingTransport>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

// =============================================================================
// Log Capture
// =============================================================================

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub text: String,
}

/// Records every event emitted while [`LogCapture::run`] is active
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with this capture as the thread's subscriber
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| e.level == level).collect()
    }
}

struct FieldText(String);

impl Visit for FieldText {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let _ = write!(self.0, "{}={:?} ", field.name(), value);
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut text = FieldText(String::new());
        event.record(&mut text);
        self.events.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            text: text.0,
        });
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Config with a fast supervisor for tests
pub fn test_config() -> Config {
    Config::builder()
        .listen_addr("127.0.0.1:0")
        .scale_interval_ms(10)
        .pool_max_threads(16)
        .build()
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

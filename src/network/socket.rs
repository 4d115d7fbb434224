//! Socket plumbing for sender workers
//!
//! [`Transport`] is the connection-owned write side of a socket.
//! [`BufferedSocket`] is the worker-owned output buffer that gets bound to a
//! different transport for every queue the worker drains.

use std::fmt;
use std::io::{self, ErrorKind, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use bytes::{Buf, BytesMut};

/// Write side of a connection's socket
///
/// Methods take `&self`: the connection owns the transport and only the
/// worker currently draining its queue writes to it.
pub trait Transport: Send + Sync + fmt::Debug {
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    fn flush(&self) -> io::Result<()>;

    /// Close both directions; errors are ignored
    fn shutdown(&self);
}

impl Transport for TcpStream {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut stream = self;
        Write::write(&mut stream, buf)
    }

    fn flush(&self) -> io::Result<()> {
        let mut stream = self;
        Write::flush(&mut stream)
    }

    fn shutdown(&self) {
        let _ = TcpStream::shutdown(self, Shutdown::Both);
    }
}

/// Buffered output stream over a rebindable transport
///
/// Writes accumulate until the buffer is full or [`flush`](Write::flush) is
/// called, so a batch of small frames turns into few socket writes.
pub struct BufferedSocket {
    target: Option<Arc<dyn Transport>>,
    buf: BytesMut,
    capacity: usize,
}

impl BufferedSocket {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            target: None,
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Point the stream at another socket, discarding unflushed bytes
    pub fn bind(&mut self, transport: Arc<dyn Transport>) {
        self.buf.clear();
        self.target = Some(transport);
    }

    /// Detach from the current socket, discarding unflushed bytes
    pub fn unbind(&mut self) {
        self.buf.clear();
        self.target = None;
    }

    pub fn is_bound(&self) -> bool {
        self.target.is_some()
    }

    /// Bytes waiting for the next drain
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn target(&self) -> io::Result<&Arc<dyn Transport>> {
        self.target
            .as_ref()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "socket stream is not bound"))
    }

    /// Push every buffered byte into the transport
    fn drain(&mut self) -> io::Result<()> {
        let target = Arc::clone(self.target()?);
        while !self.buf.is_empty() {
            match target.write(&self.buf) {
                Ok(0) => {
                    return Err(io::Error::new(ErrorKind::WriteZero, "socket accepted no bytes"));
                }
                Ok(n) => self.buf.advance(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Write for BufferedSocket {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.target()?;

        if self.buf.len() + data.len() > self.capacity {
            self.drain()?;
        }

        if data.len() >= self.capacity {
            // Too big to buffer, write through
            let target = Arc::clone(self.target()?);
            return target.write(data);
        }

        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain()?;
        self.target()?.flush()
    }
}

impl fmt::Debug for BufferedSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedSocket")
            .field("bound", &self.target.is_some())
            .field("buffered", &self.buf.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

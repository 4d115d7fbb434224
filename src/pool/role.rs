//! Role and worker contracts
//!
//! A [`Role`] is a scheduling policy plus a worker factory. The pool asks it
//! for one [`RoleWorker`] per thread it assigns to the role.

use crossbeam::channel::{select, Receiver};

use super::CancellationToken;
use crate::error::Result;

/// A named scheduling policy and worker factory
pub trait Role: Send + Sync + 'static {
    /// Role name, used for thread names and diagnostics
    fn name(&self) -> &str;

    /// Workers the pool keeps alive at all times
    fn min_threads(&self) -> usize;

    /// Upper bound on concurrently running workers
    fn max_threads(&self) -> usize;

    /// Build the worker for a newly assigned thread.
    ///
    /// Called once per assignment; must only allocate the worker's own
    /// resources.
    fn create_worker(&self, ctx: &WorkerContext) -> Result<Box<dyn RoleWorker>>;

    /// Pending work items, consulted when scaling
    fn backlog(&self) -> usize {
        0
    }

    /// Workers currently handling an item, consulted when scaling.
    ///
    /// A backlog with every worker busy means a stalled worker may be
    /// starving the rest; the pool then grows regardless of backlog size.
    fn busy_workers(&self) -> usize {
        0
    }
}

/// Per-thread execution unit bound to one role
///
/// Resources are released by `Drop`, which the pool guarantees on every exit
/// path including panics.
pub trait RoleWorker: Send {
    /// Blocking loop; returns once `ctx` reports cancellation.
    fn run(&mut self, ctx: &WorkerContext) -> Result<()>;
}

/// What a running worker knows about its assignment
#[derive(Debug, Clone)]
pub struct WorkerContext {
    role: String,
    index: usize,
    shutdown: CancellationToken,
    retire: CancellationToken,
}

impl WorkerContext {
    pub fn new(
        role: impl Into<String>,
        index: usize,
        shutdown: CancellationToken,
        retire: CancellationToken,
    ) -> Self {
        Self {
            role: role.into(),
            index,
            shutdown,
            retire,
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Pool-wide shutdown was signalled
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Worker should stop: pool shutdown or this worker was retired
    pub fn is_cancelled(&self) -> bool {
        self.is_shutdown() || self.retire.is_cancelled()
    }

    /// Block for the next item on `rx`.
    ///
    /// Returns `None` on shutdown, retirement or a closed channel. An item
    /// received while the pool shuts down is dropped; a retiring worker still
    /// hands back what it already took.
    pub fn recv<T>(&self, rx: &Receiver<T>) -> Option<T> {
        if self.is_cancelled() {
            return None;
        }
        select! {
            recv(rx) -> item => item.ok().filter(|_| !self.is_shutdown()),
            recv(self.shutdown.receiver()) -> _ => None,
            recv(self.retire.receiver()) -> _ => None,
        }
    }
}

//! Role-based thread pool
//!
//! Owns the roles and their OS threads. A supervisor thread keeps every role
//! within `[min_threads, max_threads]`, grows roles whose backlog builds up
//! and retires idle workers.

use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use super::{CancelSource, Role, RoleWorker, WorkerContext};
use crate::config::Config;
use crate::error::{RelayError, Result};

/// Snapshot of one role's worker counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleStats {
    /// Assigned workers still running
    pub live: usize,
    /// Retired workers that have not exited yet
    pub retiring: usize,
    /// Highest concurrent thread count seen
    pub peak: usize,
    /// Workers created over the role's lifetime
    pub spawned: u64,
    pub min_threads: usize,
    pub max_threads: usize,
}

#[derive(Debug, Clone, Copy)]
struct PoolSettings {
    max_threads: usize,
    scale_interval: Duration,
    scale_up_backlog: usize,
    scale_down_idle_ticks: u32,
}

struct WorkerThread {
    retire: CancelSource,
    handle: JoinHandle<()>,
}

struct RoleSlot {
    role: Arc<dyn Role>,
    workers: Vec<WorkerThread>,
    retiring: Vec<WorkerThread>,
    next_index: usize,
    peak: usize,
    spawned: u64,
    idle_ticks: u32,
}

impl RoleSlot {
    fn new(role: Arc<dyn Role>) -> Self {
        Self {
            role,
            workers: Vec::new(),
            retiring: Vec::new(),
            next_index: 0,
            peak: 0,
            spawned: 0,
            idle_ticks: 0,
        }
    }

    /// Threads that may still be executing role code
    fn running(&self) -> usize {
        self.workers.len() + self.retiring.len()
    }

    /// Join threads that have exited
    fn reap(&mut self) {
        let name = self.role.name().to_string();
        for list in [&mut self.workers, &mut self.retiring] {
            let (done, alive): (Vec<_>, Vec<_>) =
                list.drain(..).partition(|w| w.handle.is_finished());
            *list = alive;
            for worker in done {
                if worker.handle.join().is_err() {
                    tracing::error!("Worker thread of role '{}' died abnormally", name);
                }
            }
        }
    }

    fn retire_one(&mut self) {
        if let Some(worker) = self.workers.pop() {
            worker.retire.cancel();
            self.retiring.push(worker);
        }
    }

    fn stats(&self) -> RoleStats {
        RoleStats {
            live: self.workers.iter().filter(|w| !w.handle.is_finished()).count(),
            retiring: self.retiring.len(),
            peak: self.peak,
            spawned: self.spawned,
            min_threads: self.role.min_threads(),
            max_threads: self.role.max_threads(),
        }
    }
}

struct Shared {
    settings: PoolSettings,
    shutdown: CancelSource,
    slots: Mutex<Vec<RoleSlot>>,
    stopped: AtomicBool,
}

impl Shared {
    fn spawn_worker(&self, slot: &mut RoleSlot) -> Result<()> {
        let index = slot.next_index;
        slot.next_index += 1;

        let retire = CancelSource::new();
        let ctx = WorkerContext::new(slot.role.name(), index, self.shutdown.token(), retire.token());
        let worker = slot.role.create_worker(&ctx)?;

        let handle = thread::Builder::new()
            .name(format!("{}-{}", slot.role.name(), index))
            .spawn(move || run_worker(worker, ctx))?;

        slot.workers.push(WorkerThread { retire, handle });
        slot.spawned += 1;
        slot.peak = slot.peak.max(slot.running());
        Ok(())
    }

    /// One supervisor tick
    fn rebalance(&self) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            slot.reap();
        }

        let mut total: usize = slots.iter().map(RoleSlot::running).sum();

        for slot in slots.iter_mut() {
            let min = slot.role.min_threads();
            let max = slot.role.max_threads();

            // Replace workers that died
            while slot.workers.len() < min && slot.running() < max {
                if let Err(e) = self.spawn_worker(slot) {
                    tracing::error!("Failed to respawn worker for role '{}': {}", slot.role.name(), e);
                    break;
                }
                total += 1;
            }

            let backlog = slot.role.backlog();
            if backlog == 0 {
                slot.idle_ticks = slot.idle_ticks.saturating_add(1);
                if slot.idle_ticks >= self.settings.scale_down_idle_ticks && slot.workers.len() > min {
                    slot.retire_one();
                    slot.idle_ticks = 0;
                    tracing::debug!(
                        "Role '{}' idle, retiring a worker ({} left)",
                        slot.role.name(),
                        slot.workers.len()
                    );
                }
                continue;
            }

            slot.idle_ticks = 0;
            let saturated = slot.role.busy_workers() >= slot.workers.len();
            if (backlog >= self.settings.scale_up_backlog || saturated)
                && slot.running() < max
                && total < self.settings.max_threads
            {
                match self.spawn_worker(slot) {
                    Ok(()) => {
                        total += 1;
                        tracing::debug!(
                            "Role '{}' backlog {}, scaled to {} workers",
                            slot.role.name(),
                            backlog,
                            slot.workers.len()
                        );
                    }
                    Err(e) => {
                        tracing::error!("Failed to scale role '{}': {}", slot.role.name(), e)
                    }
                }
            }
        }
    }
}

/// Thread entry point: run the worker, contain its faults, always drop it
fn run_worker(mut worker: Box<dyn RoleWorker>, ctx: WorkerContext) {
    let span = tracing::debug_span!("worker", role = ctx.role(), index = ctx.index());
    let _enter = span.enter();

    tracing::debug!("Worker started");
    match panic::catch_unwind(AssertUnwindSafe(|| worker.run(&ctx))) {
        Ok(Ok(())) => tracing::debug!("Worker stopped"),
        Ok(Err(e)) => tracing::error!("Worker failed: {}", e),
        Err(payload) => tracing::error!("Worker panicked: {}", panic_message(payload.as_ref())),
    }
    drop(worker);
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Thread pool running a set of roles
pub struct ThreadPool {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Create a pool and start its supervisor
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            settings: PoolSettings {
                max_threads: config.pool_max_threads,
                scale_interval: Duration::from_millis(config.scale_interval_ms),
                scale_up_backlog: config.scale_up_backlog.max(1),
                scale_down_idle_ticks: config.scale_down_idle_ticks.max(1),
            },
            shutdown: CancelSource::new(),
            slots: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        });

        let supervisor_shared = Arc::clone(&shared);
        let supervisor = thread::Builder::new()
            .name("pool-supervisor".to_string())
            .spawn(move || {
                let token = supervisor_shared.shutdown.token();
                while !token.wait_timeout(supervisor_shared.settings.scale_interval) {
                    supervisor_shared.rebalance();
                }
            })?;

        Ok(Self {
            shared,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    /// Register a role and start its minimum workers
    pub fn add_role(&self, role: Arc<dyn Role>) -> Result<()> {
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(RelayError::Pool("pool is shut down".to_string()));
        }

        let min = role.min_threads();
        let max = role.max_threads();
        if min > max {
            return Err(RelayError::Pool(format!(
                "role '{}': min_threads {} > max_threads {}",
                role.name(),
                min,
                max
            )));
        }

        let mut slots = self.shared.slots.lock();
        if slots.iter().any(|s| s.role.name() == role.name()) {
            return Err(RelayError::Pool(format!("role '{}' already registered", role.name())));
        }

        let total: usize = slots.iter().map(RoleSlot::running).sum();
        if total + min > self.shared.settings.max_threads {
            return Err(RelayError::Pool(format!(
                "role '{}' needs {} threads, only {} of {} free",
                role.name(),
                min,
                self.shared.settings.max_threads.saturating_sub(total),
                self.shared.settings.max_threads
            )));
        }

        let mut slot = RoleSlot::new(role);
        for _ in 0..min {
            if let Err(e) = self.shared.spawn_worker(&mut slot) {
                for worker in slot.workers.drain(..) {
                    worker.retire.cancel();
                    let _ = worker.handle.join();
                }
                return Err(e);
            }
        }

        tracing::info!("Role '{}' started with {} workers", slot.role.name(), min);
        slots.push(slot);
        Ok(())
    }

    /// Worker counts for a role
    pub fn stats(&self, role: &str) -> Option<RoleStats> {
        self.shared
            .slots
            .lock()
            .iter()
            .find(|s| s.role.name() == role)
            .map(RoleSlot::stats)
    }

    /// Threads currently assigned across all roles
    pub fn thread_count(&self) -> usize {
        self.shared.slots.lock().iter().map(RoleSlot::running).sum()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Signal cancellation once, join every thread, drop every worker
    pub fn shutdown(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        tracing::info!("Shutting down thread pool");
        self.shared.shutdown.cancel();

        if let Some(supervisor) = self.supervisor.lock().take() {
            let _ = supervisor.join();
        }

        let slots = mem::take(&mut *self.shared.slots.lock());
        for slot in slots {
            for worker in slot.workers.into_iter().chain(slot.retiring) {
                if worker.handle.join().is_err() {
                    tracing::error!("Worker thread of role '{}' died abnormally", slot.role.name());
                }
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

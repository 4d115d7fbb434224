//! Thread Pool Module
//!
//! Generic scheduling core: roles declare how many threads they want and how
//! to build a worker; the pool owns the OS threads.
//!
//! ## Architecture
//! - One OS thread per worker, workers never migrate
//! - Supervisor thread enforces `[min_threads, max_threads]` per role
//! - One pool-wide cancellation signal stops every worker

mod cancel;
mod role;
mod thread_pool;

pub use cancel::{CancelSource, CancellationToken};
pub use role::{Role, RoleWorker, WorkerContext};
pub use thread_pool::{RoleStats, ThreadPool};
pub(crate) use thread_pool::panic_message;

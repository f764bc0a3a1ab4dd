//! Runtime utilities that abstract over the underlying Tokio executor.
//!
//! Downstream crates never build Tokio runtimes themselves: the pool
//! scheduler asks for a [`worker_pool`] and host code drives async helpers
//! through [`block_on`].

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion using a lightweight runtime.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Builds a multi-thread runtime whose threads are named `{name}-worker-{n}`.
///
/// `blocking_workers` caps how many synchronous jobs submitted through
/// `spawn_blocking` run at the same time; further jobs wait in Tokio's
/// unbounded blocking queue.
pub fn worker_pool(name: &str, blocking_workers: usize) -> io::Result<Runtime> {
    let prefix = worker_prefix(name);
    let counter = Arc::new(AtomicUsize::new(0));

    Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(blocking_workers.max(1))
        .thread_name_fn(move || {
            let n = counter.fetch_add(1, Ordering::Relaxed);
            format!("{}{}", prefix, n)
        })
        .enable_all()
        .build()
}

/// Thread-name prefix shared by every thread of a [`worker_pool`].
pub fn worker_prefix(name: &str) -> String {
    format!("{}-worker-", name)
}

/// Whether the calling thread belongs to the [`worker_pool`] named `name`.
pub fn on_worker_pool(name: &str) -> bool {
    let prefix = worker_prefix(name);
    std::thread::current()
        .name()
        .map(|thread| thread.starts_with(&prefix))
        .unwrap_or(false)
}

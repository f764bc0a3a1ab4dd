use super::{panic_message, Job, Scheduler, SchedulerKind};
use crate::error::SchedulingError;
use core_async::runtime::{self, Handle, Runtime};
use core_runtime::{Error, Result};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info};

/// Unordered worker pool backed by a dedicated Tokio runtime.
///
/// Jobs go through `spawn_blocking`, so at most `workers` of them run at the
/// same time. Jobs beyond that wait in an unbounded queue; dispatch never
/// blocks the caller.
pub struct PoolScheduler {
    name: String,
    workers: usize,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    closed: AtomicBool,
}

impl PoolScheduler {
    pub fn new(name: &str, workers: usize) -> Result<Arc<Self>> {
        let runtime = runtime::worker_pool(name, workers)
            .map_err(|e| Error::startup(format!("pool `{}`", name), e))?;

        info!(scheduler = %name, workers, "Pool scheduler started");

        Ok(Arc::new(Self {
            name: name.to_string(),
            workers,
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn take_runtime(&self) -> Option<Runtime> {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Scheduler for PoolScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Pool
    }

    fn dispatch(&self, job: Job) -> std::result::Result<(), SchedulingError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SchedulingError::SchedulerShutdown(self.name.clone()));
        }

        let name = self.name.clone();
        self.handle.spawn_blocking(move || {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                error!(
                    scheduler = %name,
                    "Job panicked on pool worker: {}",
                    panic_message(payload.as_ref())
                );
            }
        });
        Ok(())
    }

    fn is_current_thread(&self) -> bool {
        runtime::on_worker_pool(&self.name)
    }

    fn shutdown(&self, timeout: Duration) {
        self.closed.store(true, Ordering::Release);
        let Some(runtime) = self.take_runtime() else {
            return;
        };

        // Blocking shutdown is not allowed from inside a runtime.
        if Handle::try_current().is_ok() || self.is_current_thread() {
            debug!(scheduler = %self.name, "Pool shut down in background");
            runtime.shutdown_background();
        } else {
            runtime.shutdown_timeout(timeout);
        }
        info!(scheduler = %self.name, "Pool scheduler stopped");
    }
}

impl Drop for PoolScheduler {
    fn drop(&mut self) {
        if let Some(runtime) = self.take_runtime() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for PoolScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolScheduler")
            .field("name", &self.name)
            .field("workers", &self.workers)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

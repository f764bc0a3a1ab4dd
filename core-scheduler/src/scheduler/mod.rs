//! Schedulers decide where a work item's body and its continuations run.
//!
//! Two kinds exist:
//!
//! - [`AffinityScheduler`]: one confined OS thread draining a FIFO queue
//! - [`PoolScheduler`]: an unordered set of workers with no ordering or
//!   thread identity guarantees between items
//!
//! Both accept type-erased [`Job`]s; work items and continuations are turned
//! into jobs by the context and future layers.

mod affinity;
mod pool;

pub use affinity::AffinityScheduler;
pub use pool::PoolScheduler;

use crate::error::SchedulingError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Type-erased unit of execution handed to a scheduler.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to a scheduler.
pub type SchedulerHandle = Arc<dyn Scheduler>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Affinity,
    Pool,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerKind::Affinity => f.write_str("affinity"),
            SchedulerKind::Pool => f.write_str("pool"),
        }
    }
}

/// Where jobs execute.
pub trait Scheduler: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> SchedulerKind;

    /// Enqueues `job`. Never runs it on the calling stack.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::SchedulerShutdown`] once the scheduler has
    /// been shut down; the job is dropped without running.
    fn dispatch(&self, job: Job) -> Result<(), SchedulingError>;

    /// Whether the calling thread is one of this scheduler's threads.
    fn is_current_thread(&self) -> bool;

    /// Stops accepting jobs and waits up to `timeout` for queued ones.
    fn shutdown(&self, timeout: Duration);
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

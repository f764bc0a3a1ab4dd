use super::{panic_message, Job, Scheduler, SchedulerKind};
use crate::error::SchedulingError;
use core_async::sync::mpsc;
use core_runtime::{Error, Result};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Scheduler confined to one dedicated OS thread.
///
/// Jobs run one at a time in the order they were dispatched. The thread is
/// named after the scheduler so diagnostics can tell it apart.
pub struct AffinityScheduler {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AffinityScheduler {
    /// Spawns the affinity thread.
    pub fn spawn(name: &str) -> Result<Arc<Self>> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let scheduler = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(scheduler = %scheduler, "Affinity thread started");
                while let Some(job) = receiver.blocking_recv() {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                        error!(
                            scheduler = %scheduler,
                            "Job panicked on affinity thread: {}",
                            panic_message(payload.as_ref())
                        );
                    }
                }
                debug!(scheduler = %scheduler, "Affinity queue closed");
            })
            .map_err(|e| Error::startup(format!("affinity thread `{}`", name), e))?;

        info!(scheduler = %name, "Affinity scheduler started");

        Ok(Arc::new(Self {
            name: name.to_string(),
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(handle)),
        }))
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl Scheduler for AffinityScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Affinity
    }

    fn dispatch(&self, job: Job) -> std::result::Result<(), SchedulingError> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender
            .as_ref()
            .ok_or_else(|| SchedulingError::SchedulerShutdown(self.name.clone()))?;

        sender
            .send(job)
            .map_err(|_| SchedulingError::SchedulerShutdown(self.name.clone()))
    }

    fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn shutdown(&self, timeout: Duration) {
        // Closing the channel lets the thread drain what is queued and exit.
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(handle) = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        if self.is_current_thread() {
            debug!(scheduler = %self.name, "Shutdown requested from the affinity thread itself");
            return;
        }

        // `JoinHandle::join` has no timeout; poll so a stuck job cannot hang shutdown.
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    scheduler = %self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Affinity thread still busy at shutdown, detaching"
                );
                return;
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        if handle.join().is_err() {
            error!(scheduler = %self.name, "Affinity thread terminated abnormally");
        }
        info!(scheduler = %self.name, "Affinity scheduler stopped");
    }
}

impl fmt::Debug for AffinityScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffinityScheduler")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

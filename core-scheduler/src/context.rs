//! # Execution Context
//!
//! Scheduling state is passed explicitly instead of being read from
//! thread-local storage. Every body and continuation receives the
//! [`ExecutionContext`] it runs under, and every submission or registration
//! takes the context of the caller.
//!
//! A context carries:
//!
//! - the **active affinity context**, set while running on an affinity
//!   scheduler; continuations registered from such a context resume there
//! - the **ambient scheduler**, the scheduler executing the current body
//!   (`None` at a root context); nested [`submit`](ExecutionContext::submit)
//!   calls inherit it
//! - the running work item, which nested submissions attach to unless
//!   [`SubmitOptions::deny_child_attach`] is set
//! - the scenario name used to tag diagnostics
//!
//! ## Capture rule
//!
//! The scheduler a continuation resumes on is decided when it is registered:
//!
//! 1. the active affinity context, if there is one
//! 2. otherwise the ambient scheduler, if it is a pool
//! 3. otherwise the default pool
//!
//! Where the antecedent body ran never matters.

use crate::error::{SchedulingError, WorkError};
use crate::future::WorkFuture;
use crate::policy::SubmitOptions;
use crate::scheduler::{
    panic_message, AffinityScheduler, Job, PoolScheduler, Scheduler, SchedulerHandle,
    SchedulerKind,
};
use crate::work::{ChildTracker, WorkItem};
use bridge_traits::diagnostics::{DiagnosticRecord, DiagnosticSink};
use chrono::Utc;
use core_async::CancellationToken;
use core_runtime::config::SchedulingConfig;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

struct Shared {
    affinity: Arc<AffinityScheduler>,
    pool: Arc<PoolScheduler>,
    diagnostics: Arc<dyn DiagnosticSink>,
    shutdown_timeout: Duration,
}

/// Owns the affinity scheduler and the process default pool.
///
/// Cloning is cheap; all clones share the same schedulers.
#[derive(Clone)]
pub struct ExecutionEnvironment {
    shared: Arc<Shared>,
}

impl ExecutionEnvironment {
    /// Spawns the affinity thread and the default pool described by `config`.
    pub fn start(
        config: &SchedulingConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> core_runtime::Result<Self> {
        config.validate()?;

        let affinity = AffinityScheduler::spawn(&config.affinity_name)?;
        let pool = PoolScheduler::new(&config.pool_name, config.pool_workers)?;

        info!(
            affinity = %config.affinity_name,
            pool = %config.pool_name,
            workers = config.pool_workers,
            "Execution environment started"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                affinity,
                pool,
                diagnostics,
                shutdown_timeout: config.shutdown_timeout,
            }),
        })
    }

    /// Context of a caller that owns no affinity context and runs no body.
    pub fn root_context(&self) -> ExecutionContext {
        ExecutionContext {
            shared: Arc::clone(&self.shared),
            affinity: None,
            ambient: None,
            scenario: None,
            parent: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Posts `action` to the affinity thread, where it runs with the affinity
    /// context active. Returns without waiting for it.
    pub fn run_on_affinity<F>(&self, action: F) -> Result<(), SchedulingError>
    where
        F: FnOnce(&ExecutionContext) + Send + 'static,
    {
        let mut ctx = self.root_context();
        ctx.affinity = Some(self.affinity());

        self.shared
            .affinity
            .dispatch(Box::new(move || action(&ctx)))
    }

    pub fn affinity(&self) -> SchedulerHandle {
        self.shared.affinity.clone()
    }

    pub fn default_pool(&self) -> SchedulerHandle {
        self.shared.pool.clone()
    }

    pub fn diagnostics(&self) -> Arc<dyn DiagnosticSink> {
        Arc::clone(&self.shared.diagnostics)
    }

    /// Stops both schedulers.
    ///
    /// The affinity queue is drained first since its jobs may still dispatch
    /// to the pool.
    pub fn shutdown(&self) {
        let timeout = self.shared.shutdown_timeout;
        self.shared.affinity.shutdown(timeout);
        self.shared.pool.shutdown(timeout);
        info!("Execution environment stopped");
    }
}

impl fmt::Debug for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEnvironment")
            .field("affinity", &self.shared.affinity)
            .field("pool", &self.shared.pool)
            .finish()
    }
}

/// Scheduling state of the code currently running.
#[derive(Clone)]
pub struct ExecutionContext {
    shared: Arc<Shared>,
    affinity: Option<SchedulerHandle>,
    ambient: Option<SchedulerHandle>,
    scenario: Option<Arc<str>>,
    parent: Option<Arc<dyn ChildTracker>>,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Submits `body` to the ambient scheduler (the default pool at a root
    /// context) with default options.
    pub fn submit<T, F>(&self, body: F) -> WorkFuture<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&ExecutionContext) -> Result<T, WorkError> + Send + 'static,
    {
        self.submit_with(SubmitOptions::default(), body)
    }

    /// Submits `body` to the ambient scheduler with `options`.
    pub fn submit_with<T, F>(&self, options: SubmitOptions, body: F) -> WorkFuture<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&ExecutionContext) -> Result<T, WorkError> + Send + 'static,
    {
        let scheduler = self.ambient.clone().unwrap_or_else(|| self.default_pool());
        self.submit_to(&scheduler, options, body)
    }

    /// Submits `body` to `scheduler` and returns its future immediately.
    ///
    /// Failures raised by the body, including panics, are held by the
    /// returned future. A shut down scheduler fails the future straight from
    /// `Pending`.
    pub fn submit_to<T, F>(
        &self,
        scheduler: &SchedulerHandle,
        options: SubmitOptions,
        body: F,
    ) -> WorkFuture<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&ExecutionContext) -> Result<T, WorkError> + Send + 'static,
    {
        let parent = if options.deny_child_attach {
            None
        } else {
            self.parent.clone()
        };
        let item = WorkItem::new(self.scenario.clone(), self.diagnostics(), parent);

        let tracker: Arc<dyn ChildTracker> = item.clone();
        let body_ctx = self.running_on(scheduler, tracker, options.cancellation);

        debug!(
            work_id = %item.id(),
            scheduler = %scheduler.name(),
            attached = item.is_attached(),
            "Submitting work item"
        );

        let job_item = Arc::clone(&item);
        let job: Job = Box::new(move || run_item(&job_item, &body_ctx, body));
        if let Err(error) = scheduler.dispatch(job) {
            item.reject(error.into());
        }

        WorkFuture::from_item(item)
    }

    /// Scheduler a continuation registered from this context resumes on.
    pub fn continuation_target(&self) -> SchedulerHandle {
        if let Some(affinity) = &self.affinity {
            return affinity.clone();
        }
        match &self.ambient {
            Some(ambient) if ambient.kind() == SchedulerKind::Pool => ambient.clone(),
            _ => self.default_pool(),
        }
    }

    /// Context for code that runs on `scheduler` as part of `item`.
    pub(crate) fn running_on(
        &self,
        scheduler: &SchedulerHandle,
        item: Arc<dyn ChildTracker>,
        cancellation: CancellationToken,
    ) -> ExecutionContext {
        let affinity = match scheduler.kind() {
            SchedulerKind::Affinity => Some(scheduler.clone()),
            SchedulerKind::Pool => None,
        };

        ExecutionContext {
            shared: Arc::clone(&self.shared),
            affinity,
            ambient: Some(scheduler.clone()),
            scenario: self.scenario.clone(),
            parent: Some(item),
            cancellation,
        }
    }

    /// Captures the current thread and scheduling state under `label`.
    pub fn snapshot(&self, label: &str) -> DiagnosticRecord {
        let current = thread::current();

        DiagnosticRecord {
            call_site_label: label.to_string(),
            logical_thread_id: format!("{:?}", current.id()),
            thread_name: current.name().map(str::to_string),
            is_affinity_thread: self.shared.affinity.is_current_thread(),
            active_affinity_context_name: self.affinity.as_ref().map(|s| s.name().to_string()),
            ambient_scheduler_name: self.ambient.as_ref().map(|s| s.name().to_string()),
            default_scheduler_name: self.shared.pool.name().to_string(),
            scenario: self.scenario.as_deref().map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    /// Sends a [`snapshot`](Self::snapshot) to the diagnostic sink.
    pub fn observe(&self, label: &str) {
        self.shared.diagnostics.record(self.snapshot(label));
    }

    /// Same context, tagged with `scenario`.
    pub fn with_scenario(&self, scenario: &str) -> ExecutionContext {
        ExecutionContext {
            scenario: Some(Arc::from(scenario)),
            ..self.clone()
        }
    }

    pub fn affinity_context(&self) -> Option<&SchedulerHandle> {
        self.affinity.as_ref()
    }

    pub fn ambient_scheduler(&self) -> Option<&SchedulerHandle> {
        self.ambient.as_ref()
    }

    pub fn default_pool(&self) -> SchedulerHandle {
        self.shared.pool.clone()
    }

    pub fn affinity_scheduler(&self) -> SchedulerHandle {
        self.shared.affinity.clone()
    }

    pub fn scenario(&self) -> Option<&str> {
        self.scenario.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn diagnostics(&self) -> Arc<dyn DiagnosticSink> {
        Arc::clone(&self.shared.diagnostics)
    }

    pub(crate) fn scenario_tag(&self) -> Option<Arc<str>> {
        self.scenario.clone()
    }

    /// Whether the caller is running on the environment's affinity thread.
    pub fn on_affinity_thread(&self) -> bool {
        self.shared.affinity.is_current_thread()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("affinity", &self.affinity.as_ref().map(|s| s.name().to_string()))
            .field("ambient", &self.ambient.as_ref().map(|s| s.name().to_string()))
            .field("scenario", &self.scenario)
            .field("attached", &self.parent.is_some())
            .finish()
    }
}

/// Runs `body` as the body of `item`, capturing errors and panics.
pub(crate) fn run_item<T, F>(item: &WorkItem<T>, ctx: &ExecutionContext, body: F)
where
    T: Clone + Send + 'static,
    F: FnOnce(&ExecutionContext) -> Result<T, WorkError>,
{
    if !item.start() {
        return;
    }

    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| body(ctx))) {
        Ok(outcome) => outcome,
        Err(payload) => Err(WorkError::Panicked(panic_message(payload.as_ref()))),
    };

    item.finish_body(outcome);
}

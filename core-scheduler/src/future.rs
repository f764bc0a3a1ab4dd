//! Handles to the eventual outcome of a work item.

use crate::context::{run_item, ExecutionContext};
use crate::error::{SchedulingError, WorkError};
use crate::scheduler::Job;
use crate::work::{ChildTracker, Outcome, WorkId, WorkItem, WorkState};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Handle to a work item's eventual value or error.
///
/// Clones share the same item. Continuations registered through
/// [`on_complete`](Self::on_complete) each fire exactly once, in registration
/// order, on the scheduler captured from the registering context.
pub struct WorkFuture<T> {
    pub(crate) item: Arc<WorkItem<T>>,
}

impl<T: Clone + Send + 'static> WorkFuture<T> {
    pub(crate) fn from_item(item: Arc<WorkItem<T>>) -> Self {
        Self { item }
    }

    pub fn id(&self) -> WorkId {
        self.item.id()
    }

    pub fn state(&self) -> WorkState {
        self.item.state()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Every state the item has been in, oldest first.
    pub fn history(&self) -> Vec<WorkState> {
        self.item.history()
    }

    /// Number of continuations registered so far.
    pub fn registration_count(&self) -> usize {
        self.item.registrations()
    }

    /// Whether the item was attached as a child of the body that submitted it.
    pub fn is_attached(&self) -> bool {
        self.item.is_attached()
    }

    /// Registers `continuation` to run once this future is terminal.
    ///
    /// The continuation is dispatched to
    /// [`ctx.continuation_target()`](ExecutionContext::continuation_target)
    /// as evaluated now, and receives the outcome whether it is a value or an
    /// error. Registration never blocks; if the future is already terminal the
    /// continuation is dispatched right away.
    ///
    /// Registering the same logic twice runs it twice.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::InvalidState`] if the outcome was already
    /// [consumed](Self::consume).
    pub fn on_complete<U, F>(
        &self,
        ctx: &ExecutionContext,
        continuation: F,
    ) -> Result<WorkFuture<U>, SchedulingError>
    where
        U: Clone + Send + 'static,
        F: FnOnce(&ExecutionContext, Result<T, WorkError>) -> Result<U, WorkError>
            + Send
            + 'static,
    {
        let target = ctx.continuation_target();
        let proxy = WorkItem::<U>::new(ctx.scenario_tag(), ctx.diagnostics(), None);

        let tracker: Arc<dyn ChildTracker> = proxy.clone();
        let resumed = ctx.running_on(&target, tracker, ctx.cancellation().clone());

        debug!(
            antecedent = %self.item.id(),
            work_id = %proxy.id(),
            scheduler = %target.name(),
            "Registering continuation"
        );

        let registered = Arc::clone(&proxy);
        self.item.register(Box::new(move |outcome: Outcome<T>| {
            let job_item = Arc::clone(&registered);
            let job: Job = Box::new(move || {
                run_item(&job_item, &resumed, move |ctx| continuation(ctx, outcome))
            });
            if let Err(error) = target.dispatch(job) {
                registered.reject(error.into());
            }
        }))?;

        Ok(WorkFuture::from_item(proxy))
    }

    /// Runs `f` with the value on success. Errors skip `f` and propagate.
    pub fn then<U, F>(&self, ctx: &ExecutionContext, f: F) -> Result<WorkFuture<U>, SchedulingError>
    where
        U: Clone + Send + 'static,
        F: FnOnce(&ExecutionContext, T) -> Result<U, WorkError> + Send + 'static,
    {
        self.on_complete(ctx, move |ctx, outcome| outcome.and_then(|value| f(ctx, value)))
    }

    /// Runs `f` with the error on failure. Values pass through untouched.
    pub fn recover<F>(&self, ctx: &ExecutionContext, f: F) -> Result<WorkFuture<T>, SchedulingError>
    where
        F: FnOnce(&ExecutionContext, WorkError) -> Result<T, WorkError> + Send + 'static,
    {
        self.on_complete(ctx, move |ctx, outcome| match outcome {
            Ok(value) => Ok(value),
            Err(error) => f(ctx, error),
        })
    }

    /// Takes the outcome out of a terminal future.
    ///
    /// Afterwards every clone of this future rejects registrations.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::InvalidState`] if the future is not terminal yet or
    /// was already consumed.
    pub fn consume(&self) -> Result<Result<T, WorkError>, SchedulingError> {
        self.item.consume()
    }

    /// Blocks until the future is terminal and returns a copy of its outcome.
    ///
    /// For hosts and tests only. Calling it on the affinity thread while the
    /// outcome depends on affinity work never returns before `timeout`.
    pub fn wait(&self, timeout: Duration) -> Result<Result<T, WorkError>, SchedulingError> {
        self.item.wait(timeout)
    }

    /// Blocks until the future is terminal without observing its outcome.
    pub fn wait_settled(&self, timeout: Duration) -> bool {
        self.item.wait_settled(timeout)
    }
}

impl<T> Clone for WorkFuture<T> {
    fn clone(&self) -> Self {
        Self {
            item: Arc::clone(&self.item),
        }
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for WorkFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkFuture")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Clone + Send + 'static> fmt::Display for WorkFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkFuture<{}>({})", std::any::type_name::<T>(), self.state())
    }
}

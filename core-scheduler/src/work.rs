//! Work items: single-shot computations and their completion state.
//!
//! A work item moves through `Pending -> Running -> {Completed | Failed}`
//! exactly once. All state lives behind one mutex; completion takes the list
//! of registered waiters while holding it and fires them after releasing it,
//! so a registration racing with completion is either queued before the
//! completion or sees the terminal outcome, never neither.

use crate::error::{SchedulingError, WorkError};
use bridge_traits::diagnostics::{DiagnosticSink, UnobservedError};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) type Outcome<T> = Result<T, WorkError>;
pub(crate) type Waiter<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

/// Work item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId(Uuid);

impl WorkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work item execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    /// Submitted, waiting for its scheduler
    Pending,
    /// Body executing, or waiting for attached children
    Running,
    /// Finished with a value
    Completed,
    /// Finished with an error
    Failed,
}

impl WorkState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkState::Completed | WorkState::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// `Pending -> Failed` only happens when the target scheduler refused
    /// the item.
    pub fn can_transition_to(self, next: WorkState) -> bool {
        matches!(
            (self, next),
            (WorkState::Pending, WorkState::Running)
                | (WorkState::Pending, WorkState::Failed)
                | (WorkState::Running, WorkState::Completed)
                | (WorkState::Running, WorkState::Failed)
        )
    }
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkState::Pending => "pending",
            WorkState::Running => "running",
            WorkState::Completed => "completed",
            WorkState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Parent side of child attachment.
pub(crate) trait ChildTracker: Send + Sync {
    /// Registers one more attached child. Returns `false` when the parent
    /// already finished, in which case the child runs as an independent root.
    fn attach_child(&self) -> bool;

    fn child_finished(&self, error: Option<WorkError>);
}

struct ItemState<T> {
    state: WorkState,
    history: Vec<WorkState>,
    outcome: Option<Outcome<T>>,
    consumed: bool,
    observed: bool,
    registrations: usize,
    waiters: Vec<Waiter<T>>,
    body_outcome: Option<Outcome<T>>,
    pending_children: usize,
    child_error: Option<WorkError>,
}

pub(crate) struct WorkItem<T> {
    id: WorkId,
    scenario: Option<Arc<str>>,
    diagnostics: Arc<dyn DiagnosticSink>,
    parent: Option<Arc<dyn ChildTracker>>,
    inner: Mutex<ItemState<T>>,
    settled: Condvar,
}

impl<T: Clone + Send + 'static> WorkItem<T> {
    pub(crate) fn new(
        scenario: Option<Arc<str>>,
        diagnostics: Arc<dyn DiagnosticSink>,
        parent: Option<Arc<dyn ChildTracker>>,
    ) -> Arc<Self> {
        let parent = parent.filter(|parent| parent.attach_child());

        Arc::new(Self {
            id: WorkId::new(),
            scenario,
            diagnostics,
            parent,
            inner: Mutex::new(ItemState {
                state: WorkState::Pending,
                history: vec![WorkState::Pending],
                outcome: None,
                consumed: false,
                observed: false,
                registrations: 0,
                waiters: Vec::new(),
                body_outcome: None,
                pending_children: 0,
                child_error: None,
            }),
            settled: Condvar::new(),
        })
    }

    pub(crate) fn id(&self) -> WorkId {
        self.id
    }

    pub(crate) fn scenario(&self) -> Option<Arc<str>> {
        self.scenario.clone()
    }

    pub(crate) fn diagnostics(&self) -> Arc<dyn DiagnosticSink> {
        Arc::clone(&self.diagnostics)
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.parent.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, ItemState<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> WorkState {
        self.lock().state
    }

    pub(crate) fn history(&self) -> Vec<WorkState> {
        self.lock().history.clone()
    }

    pub(crate) fn registrations(&self) -> usize {
        self.lock().registrations
    }

    /// `Pending -> Running`. Returns `false` if the item was not pending.
    pub(crate) fn start(&self) -> bool {
        let mut state = self.lock();
        if !state.state.can_transition_to(WorkState::Running) {
            warn!(work_id = %self.id, state = %state.state, "Work item started twice");
            return false;
        }
        state.state = WorkState::Running;
        state.history.push(WorkState::Running);
        true
    }

    /// Records the body's outcome; completes now unless attached children
    /// are still running.
    pub(crate) fn finish_body(&self, outcome: Outcome<T>) {
        let mut state = self.lock();
        if state.pending_children > 0 {
            debug!(
                work_id = %self.id,
                children = state.pending_children,
                "Body finished, waiting for attached children"
            );
            state.body_outcome = Some(outcome);
            return;
        }
        let (outcome, discarded) = combine(outcome, state.child_error.take());
        self.settle(state, outcome);
        if let Some(error) = discarded {
            self.report_discarded(&error);
        }
    }

    /// Completes an item that has no body of its own (flatten proxies).
    ///
    /// A pending item passes through `Running` first.
    pub(crate) fn complete(&self, outcome: Outcome<T>) {
        let mut state = self.lock();
        if state.state.is_terminal() {
            warn!(work_id = %self.id, "Ignoring second completion");
            return;
        }
        if state.state == WorkState::Pending {
            state.state = WorkState::Running;
            state.history.push(WorkState::Running);
        }
        self.settle(state, outcome);
    }

    /// Fails an item its scheduler refused to accept.
    pub(crate) fn reject(&self, error: WorkError) {
        let state = self.lock();
        if state.state != WorkState::Pending {
            return;
        }
        warn!(work_id = %self.id, error = %error, "Work item rejected");
        self.settle(state, Err(error));
    }

    fn settle(&self, mut state: MutexGuard<'_, ItemState<T>>, outcome: Outcome<T>) {
        let next = if outcome.is_ok() {
            WorkState::Completed
        } else {
            WorkState::Failed
        };
        debug_assert!(state.state.can_transition_to(next));

        state.state = next;
        state.history.push(next);
        state.outcome = Some(outcome.clone());
        if self.parent.is_some() {
            // The parent adopts the failure or reports it when it cannot.
            state.observed = true;
        }
        let waiters = std::mem::take(&mut state.waiters);
        drop(state);

        self.settled.notify_all();
        debug!(work_id = %self.id, state = %next, waiters = waiters.len(), "Work item settled");

        for waiter in waiters {
            waiter(outcome.clone());
        }

        if let Some(parent) = &self.parent {
            parent.child_finished(outcome.err());
        }
    }

    /// Reports an attached child's failure that lost out to another error.
    fn report_discarded(&self, error: &WorkError) {
        let report = UnobservedError {
            scenario: self.scenario.as_deref().map(str::to_string),
            error_kind: error.kind().to_string(),
            message: error.to_string(),
        };
        debug!(work_id = %self.id, kind = %report.error_kind, "Attached child failure not adopted");
        self.diagnostics.unobserved_error(report);
    }

    /// Registers `waiter` to receive the outcome exactly once.
    ///
    /// Fires immediately, on the calling thread, when the item is already
    /// terminal.
    pub(crate) fn register(&self, waiter: Waiter<T>) -> Result<(), SchedulingError> {
        let mut state = self.lock();
        if state.consumed {
            return Err(SchedulingError::InvalidState(format!(
                "work item {} was already consumed",
                self.id
            )));
        }
        state.registrations += 1;
        state.observed = true;

        match state.outcome.clone() {
            Some(outcome) => {
                drop(state);
                waiter(outcome);
            }
            None => state.waiters.push(waiter),
        }
        Ok(())
    }

    /// Moves the outcome out. Later registrations fail with `InvalidState`.
    pub(crate) fn consume(&self) -> Result<Outcome<T>, SchedulingError> {
        let mut state = self.lock();
        if state.consumed {
            return Err(SchedulingError::InvalidState(format!(
                "work item {} was already consumed",
                self.id
            )));
        }
        let outcome = state.outcome.take().ok_or_else(|| {
            SchedulingError::InvalidState(format!("work item {} has not completed", self.id))
        })?;
        state.consumed = true;
        state.observed = true;
        Ok(outcome)
    }

    /// Blocks the calling thread until the item is terminal.
    pub(crate) fn wait(&self, timeout: Duration) -> Result<Outcome<T>, SchedulingError> {
        let state = self.lock();
        let (mut state, result) = self
            .settled
            .wait_timeout_while(state, timeout, |state| !state.state.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);

        if result.timed_out() && !state.state.is_terminal() {
            return Err(SchedulingError::TimedOut(timeout));
        }
        if state.consumed {
            return Err(SchedulingError::InvalidState(format!(
                "work item {} was already consumed",
                self.id
            )));
        }
        state.observed = true;
        state.outcome.clone().ok_or_else(|| {
            SchedulingError::InvalidState(format!("work item {} has no outcome", self.id))
        })
    }

    /// Like [`wait`](Self::wait) but does not observe the outcome.
    pub(crate) fn wait_settled(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .settled
            .wait_timeout_while(state, timeout, |state| !state.state.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        state.state.is_terminal()
    }
}

impl<T: Clone + Send + 'static> ChildTracker for WorkItem<T> {
    fn attach_child(&self) -> bool {
        let mut state = self.lock();
        if state.state.is_terminal() {
            return false;
        }
        state.pending_children += 1;
        true
    }

    fn child_finished(&self, error: Option<WorkError>) {
        let mut state = self.lock();
        state.pending_children = state.pending_children.saturating_sub(1);

        // Only the first child failure is adopted.
        let mut discarded = Vec::new();
        match error {
            Some(error) if state.child_error.is_none() => state.child_error = Some(error),
            Some(error) => discarded.push(error),
            None => {}
        }

        let body_outcome = if state.pending_children == 0 {
            state.body_outcome.take()
        } else {
            None
        };
        match body_outcome {
            Some(body_outcome) => {
                let (outcome, lost) = combine(body_outcome, state.child_error.take());
                discarded.extend(lost);
                self.settle(state, outcome);
            }
            None => drop(state),
        }

        for error in &discarded {
            self.report_discarded(error);
        }
    }
}

/// Final outcome of a body and its attached children. A body failure wins;
/// the child failure it displaced is returned so it can be reported.
fn combine<T>(
    body: Outcome<T>,
    child_error: Option<WorkError>,
) -> (Outcome<T>, Option<WorkError>) {
    match (body, child_error) {
        (Err(error), child) => (Err(error), child),
        (Ok(_), Some(child)) => (Err(WorkError::ChildFailed(Box::new(child))), None),
        (Ok(value), None) => (Ok(value), None),
    }
}

impl<T> Drop for WorkItem<T> {
    fn drop(&mut self) {
        let state = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.observed || state.consumed {
            return;
        }
        let Some(Err(error)) = &state.outcome else {
            return;
        };

        let report = UnobservedError {
            scenario: self.scenario.as_deref().map(str::to_string),
            error_kind: error.kind().to_string(),
            message: error.to_string(),
        };
        debug!(work_id = %self.id, kind = %report.error_kind, "Failed work item dropped unobserved");
        self.diagnostics.unobserved_error(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::diagnostics::NullDiagnosticSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item<T: Clone + Send + 'static>() -> Arc<WorkItem<T>> {
        WorkItem::new(None, Arc::new(NullDiagnosticSink), None)
    }

    #[test]
    fn test_transition_table() {
        use WorkState::*;

        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn test_history_records_each_transition_once() {
        let item = item::<u32>();
        assert!(item.start());
        assert!(!item.start());
        item.finish_body(Ok(7));
        item.complete(Ok(8));

        assert_eq!(
            item.history(),
            vec![WorkState::Pending, WorkState::Running, WorkState::Completed]
        );
        assert_eq!(item.consume(), Ok(Ok(7)));
    }

    #[test]
    fn test_waiters_fire_once_in_registration_order() {
        let item = item::<u32>();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            item.register(Box::new(move |_| order.lock().unwrap().push(n)))
                .unwrap();
        }

        item.start();
        item.finish_body(Ok(1));

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_register_after_completion_fires_immediately() {
        let item = item::<u32>();
        item.start();
        item.finish_body(Ok(5));

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        item.register(Box::new(move |outcome| {
            assert_eq!(outcome, Ok(5));
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_consume_twice_is_invalid() {
        let item = item::<u32>();
        assert!(matches!(item.consume(), Err(SchedulingError::InvalidState(_))));

        item.start();
        item.finish_body(Ok(1));
        assert_eq!(item.consume(), Ok(Ok(1)));
        assert!(matches!(item.consume(), Err(SchedulingError::InvalidState(_))));
        assert!(matches!(
            item.register(Box::new(|_| {})),
            Err(SchedulingError::InvalidState(_))
        ));
    }

    #[test]
    fn test_parent_waits_for_children() {
        let parent = item::<u32>();
        parent.start();

        let tracker: Arc<dyn ChildTracker> = parent.clone();
        let child = WorkItem::<u32>::new(None, Arc::new(NullDiagnosticSink), Some(tracker));
        assert!(child.is_attached());

        parent.finish_body(Ok(1));
        assert_eq!(parent.state(), WorkState::Running);

        child.start();
        child.finish_body(Ok(2));
        assert_eq!(parent.state(), WorkState::Completed);
    }

    #[test]
    fn test_child_failure_fails_parent() {
        let parent = item::<u32>();
        parent.start();

        let tracker: Arc<dyn ChildTracker> = parent.clone();
        let child = WorkItem::<u32>::new(None, Arc::new(NullDiagnosticSink), Some(tracker));
        child.start();
        child.finish_body(Err(WorkError::body("child broke")));

        parent.finish_body(Ok(1));
        assert_eq!(
            parent.consume(),
            Ok(Err(WorkError::ChildFailed(Box::new(WorkError::body(
                "child broke"
            )))))
        );
    }

    #[test]
    fn test_second_child_failure_is_reported_by_parent() {
        let sink = Arc::new(bridge_desktop::MemoryDiagnosticSink::new());
        let parent = WorkItem::<u32>::new(None, sink.clone(), None);
        parent.start();

        let children: Vec<_> = ["first", "second"]
            .into_iter()
            .map(|message| {
                let tracker: Arc<dyn ChildTracker> = parent.clone();
                let child = WorkItem::<u32>::new(None, sink.clone(), Some(tracker));
                (child, message)
            })
            .collect();
        parent.finish_body(Ok(1));

        for (child, message) in &children {
            child.start();
            child.finish_body(Err(WorkError::body(*message)));
        }

        assert_eq!(
            parent.consume(),
            Ok(Err(WorkError::ChildFailed(Box::new(WorkError::body("first")))))
        );
        let errors = sink.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "second");
    }

    #[test]
    fn test_attach_to_finished_parent_is_refused() {
        let parent = item::<u32>();
        parent.start();
        parent.finish_body(Ok(1));

        let tracker: Arc<dyn ChildTracker> = parent.clone();
        let child = WorkItem::<u32>::new(None, Arc::new(NullDiagnosticSink), Some(tracker));
        assert!(!child.is_attached());
    }

    #[test]
    fn test_complete_without_body_passes_through_running() {
        let item = item::<u32>();
        item.complete(Err(WorkError::body("outer failed")));
        assert_eq!(
            item.history(),
            vec![WorkState::Pending, WorkState::Running, WorkState::Failed]
        );
    }

    #[test]
    fn test_reject_skips_running() {
        let item = item::<u32>();
        item.reject(WorkError::SchedulerShutdown("pool".into()));
        assert_eq!(item.history(), vec![WorkState::Pending, WorkState::Failed]);
    }

    #[test]
    fn test_wait_times_out_while_pending() {
        let item = item::<u32>();
        assert_eq!(
            item.wait(Duration::from_millis(10)),
            Err(SchedulingError::TimedOut(Duration::from_millis(10)))
        );
        assert!(!item.wait_settled(Duration::from_millis(10)));
    }
}

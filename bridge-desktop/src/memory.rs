//! In-memory diagnostic sink.

use bridge_traits::diagnostics::{DiagnosticRecord, DiagnosticSink, UnobservedError};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct Collected {
    records: Vec<DiagnosticRecord>,
    errors: Vec<UnobservedError>,
}

/// Sink that keeps everything it receives.
#[derive(Default)]
pub struct MemoryDiagnosticSink {
    collected: Mutex<Collected>,
    changed: Condvar,
}

impl MemoryDiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collected> {
        self.collected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.lock().records.clone()
    }

    /// Records tagged with `scenario`, in arrival order.
    pub fn records_for(&self, scenario: &str) -> Vec<DiagnosticRecord> {
        self.lock()
            .records
            .iter()
            .filter(|record| record.scenario.as_deref() == Some(scenario))
            .cloned()
            .collect()
    }

    /// The first record with `label`, if any.
    pub fn find(&self, label: &str) -> Option<DiagnosticRecord> {
        self.lock()
            .records
            .iter()
            .find(|record| record.call_site_label == label)
            .cloned()
    }

    pub fn errors(&self) -> Vec<UnobservedError> {
        self.lock().errors.clone()
    }

    /// Blocks until at least `count` records arrived. Returns `false` on
    /// timeout.
    pub fn wait_for_records(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |collected| collected.records.len() >= count)
    }

    /// Blocks until at least `count` unobserved failures were reported.
    pub fn wait_for_errors(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |collected| collected.errors.len() >= count)
    }

    /// Blocks until a record with `label` arrived.
    pub fn wait_for_label(&self, label: &str, timeout: Duration) -> Option<DiagnosticRecord> {
        let found = self.wait_until(timeout, |collected| {
            collected
                .records
                .iter()
                .any(|record| record.call_site_label == label)
        });
        if found {
            self.find(label)
        } else {
            None
        }
    }

    pub fn clear(&self) {
        let mut collected = self.lock();
        collected.records.clear();
        collected.errors.clear();
    }

    fn wait_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut(&Collected) -> bool,
    {
        let collected = self.lock();
        let (collected, _) = self
            .changed
            .wait_timeout_while(collected, timeout, |collected| !done(&*collected))
            .unwrap_or_else(PoisonError::into_inner);
        done(&*collected)
    }
}

impl DiagnosticSink for MemoryDiagnosticSink {
    fn record(&self, record: DiagnosticRecord) {
        self.lock().records.push(record);
        self.changed.notify_all();
    }

    fn unobserved_error(&self, report: UnobservedError) {
        self.lock().errors.push(report);
        self.changed.notify_all();
    }
}

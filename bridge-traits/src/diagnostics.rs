//! Diagnostic Records
//!
//! Structured observations emitted at every call site a scenario wants to
//! show: which logical thread ran it, whether that thread is the affinity
//! thread, and which schedulers were active at the time.
//!
//! Records from concurrent scenarios arrive in no particular order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder rendered for absent scheduler or context names.
pub const NOT_AVAILABLE: &str = "(n/a)";

/// One observation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    /// Human-readable label of the observation point
    pub call_site_label: String,
    /// Identity of the OS thread the observation ran on
    pub logical_thread_id: String,
    /// Name of that thread, when it has one
    pub thread_name: Option<String>,
    /// Whether the observation ran on the affinity thread
    pub is_affinity_thread: bool,
    /// Affinity context active at the call site
    pub active_affinity_context_name: Option<String>,
    /// Ambient scheduler at the call site
    pub ambient_scheduler_name: Option<String>,
    /// Process default pool
    pub default_scheduler_name: String,
    /// Scenario the observation belongs to
    pub scenario: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticRecord {
    /// Affinity context name, or `(n/a)`.
    pub fn affinity_context_display(&self) -> &str {
        self.active_affinity_context_name
            .as_deref()
            .unwrap_or(NOT_AVAILABLE)
    }

    /// Ambient scheduler name, or `(n/a)`.
    pub fn ambient_scheduler_display(&self) -> &str {
        self.ambient_scheduler_name.as_deref().unwrap_or(NOT_AVAILABLE)
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: thread={} ({}) affinity-thread={} context={} ambient={} default={}",
            self.scenario.as_deref().unwrap_or(NOT_AVAILABLE),
            self.call_site_label,
            self.logical_thread_id,
            self.thread_name.as_deref().unwrap_or("unnamed"),
            self.is_affinity_thread,
            self.affinity_context_display(),
            self.ambient_scheduler_display(),
            self.default_scheduler_name,
        )
    }
}

/// Report for a failed future that was dropped without anyone observing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnobservedError {
    pub scenario: Option<String>,
    pub error_kind: String,
    pub message: String,
}

impl fmt::Display for UnobservedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] unobserved {} error: {}",
            self.scenario.as_deref().unwrap_or(NOT_AVAILABLE),
            self.error_kind,
            self.message
        )
    }
}

/// Receiver of diagnostic output.
///
/// Implementations only render; they must not block for long since they are
/// called from scheduler threads.
pub trait DiagnosticSink: Send + Sync {
    /// Render one observation.
    fn record(&self, record: DiagnosticRecord);

    /// Render a failure nobody observed.
    fn unobserved_error(&self, report: UnobservedError);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnosticSink;

impl DiagnosticSink for NullDiagnosticSink {
    fn record(&self, _record: DiagnosticRecord) {}

    fn unobserved_error(&self, _report: UnobservedError) {}
}

//! # Diagnostic Event Bus
//!
//! Broadcasts diagnostic observations to any number of subscribers using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Scenarios report observations through a
//! [`DiagnosticSink`](bridge_traits::diagnostics::DiagnosticSink). The
//! [`EventBus`] is such a sink: every record and every unobserved failure
//! report becomes a [`DiagnosticEvent`] that presentation layers subscribe
//! to and render at their own pace.
//!
//! ```text
//! ┌──────────────┐   record    ┌───────────┐   subscribe   ┌──────────────┐
//! │ affinity thr ├────────────>│           ├──────────────>│ console view │
//! └──────────────┘             │ EventBus  │               └──────────────┘
//! ┌──────────────┐   record    │ (broadcast│   subscribe   ┌──────────────┐
//! │ pool workers ├────────────>│  channel) ├──────────────>│ test harness │
//! └──────────────┘             └───────────┘               └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use bridge_traits::diagnostics::{DiagnosticSink, UnobservedError};
//! use core_runtime::events::{DiagnosticEvent, EventBus};
//!
//! let bus = EventBus::new(16);
//! let mut subscriber = bus.subscribe();
//!
//! bus.unobserved_error(UnobservedError {
//!     scenario: Some("unobserved-fault".to_string()),
//!     error_kind: "body".to_string(),
//!     message: "boom".to_string(),
//! });
//!
//! let event = subscriber.try_recv().unwrap();
//! assert!(matches!(event, DiagnosticEvent::UnobservedError(_)));
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events; it can keep receiving.
//! - **`RecvError::Closed`**: the bus was dropped.
//!
//! Emitting with no subscribers is not an error for the sink path: the event
//! is dropped and a trace event is logged.

use bridge_traits::diagnostics::{DiagnosticRecord, DiagnosticSink, UnobservedError};
use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Event published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum DiagnosticEvent {
    /// A scenario observation point
    Observation(DiagnosticRecord),
    /// A failed future was dropped without being observed
    UnobservedError(UnobservedError),
}

impl DiagnosticEvent {
    /// Scenario the event belongs to, if any.
    pub fn scenario(&self) -> Option<&str> {
        match self {
            DiagnosticEvent::Observation(record) => record.scenario.as_deref(),
            DiagnosticEvent::UnobservedError(report) => report.scenario.as_deref(),
        }
    }

    /// Whether the event reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, DiagnosticEvent::UnobservedError(_))
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::Observation(record) => write!(f, "{}", record),
            DiagnosticEvent::UnobservedError(report) => write!(f, "{}", report),
        }
    }
}

/// Central broadcast channel for diagnostic events.
pub struct EventBus {
    sender: broadcast::Sender<DiagnosticEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall more than `capacity` events behind receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: DiagnosticEvent) -> Result<usize, SendError<DiagnosticEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<DiagnosticEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, event: DiagnosticEvent) {
        if self.emit(event).is_err() {
            tracing::trace!("Diagnostic event dropped: no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl DiagnosticSink for EventBus {
    fn record(&self, record: DiagnosticRecord) {
        self.publish(DiagnosticEvent::Observation(record));
    }

    fn unobserved_error(&self, report: UnobservedError) {
        tracing::warn!(
            scenario = report.scenario.as_deref().unwrap_or_default(),
            kind = %report.error_kind,
            "Unobserved failure: {}",
            report.message
        );
        self.publish(DiagnosticEvent::UnobservedError(report));
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

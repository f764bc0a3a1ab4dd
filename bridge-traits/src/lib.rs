//! # Host Bridge Traits
//!
//! Contracts between the scheduling core and the host that drives it.
//!
//! ## Overview
//!
//! The core never depends on a UI toolkit or a concrete log pipeline. A host
//! (console, GUI, test harness) implements the traits below and hands them to
//! the core:
//!
//! - [`ActionRegistry`](presentation::ActionRegistry) - receives one
//!   zero-argument trigger per named scenario
//! - [`DiagnosticSink`](diagnostics::DiagnosticSink) - renders
//!   [`DiagnosticRecord`](diagnostics::DiagnosticRecord) observations and
//!   unobserved failure reports
//! - [`LoggerSink`](log::LoggerSink) - mirrors structured log events into a
//!   host logging pipeline
//!
//! ## Thread Safety
//!
//! Sinks are invoked from whichever thread observes an event (affinity
//! thread or pool worker), so they require `Send + Sync`.
//!
//! ## Examples
//!
//! ```
//! use bridge_traits::diagnostics::{DiagnosticRecord, DiagnosticSink, UnobservedError};
//!
//! struct StdoutSink;
//!
//! impl DiagnosticSink for StdoutSink {
//!     fn record(&self, record: DiagnosticRecord) {
//!         println!("{}", record);
//!     }
//!
//!     fn unobserved_error(&self, report: UnobservedError) {
//!         eprintln!("{}", report);
//!     }
//! }
//! ```

pub mod diagnostics;
pub mod error;
pub mod log;
pub mod presentation;

pub use error::BridgeError;

// Re-export commonly used types
pub use diagnostics::{
    DiagnosticRecord, DiagnosticSink, NullDiagnosticSink, UnobservedError, NOT_AVAILABLE,
};
pub use log::{LogEntry, LogLevel, LoggerSink};
pub use presentation::{ActionRegistry, Trigger};

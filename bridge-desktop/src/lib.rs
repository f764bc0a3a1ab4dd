//! # Desktop Bridge Implementations
//!
//! Console-host implementations of the bridge traits.
//!
//! ## Overview
//!
//! - [`ConsolePresenter`]: an [`ActionRegistry`](bridge_traits::ActionRegistry)
//!   that stands in for a window of buttons; actions are triggered by label
//! - [`ConsoleDiagnosticSink`]: renders diagnostic records as text or JSON
//!   lines on stdout
//! - [`MemoryDiagnosticSink`]: collects records for assertions, with timed
//!   waits since records arrive from other threads
//! - [`JsonLinesLoggerSink`]: appends mirrored log entries to a file
//!
//! ## Usage
//!
//! ```
//! use bridge_desktop::ConsolePresenter;
//! use bridge_traits::ActionRegistry;
//! use std::sync::Arc;
//!
//! let mut presenter = ConsolePresenter::new();
//! presenter.register_action("unwrap", Arc::new(|| println!("clicked")));
//!
//! assert_eq!(presenter.labels(), vec!["unwrap"]);
//! presenter.trigger("unwrap").unwrap();
//! ```

mod console;
mod logger;
mod memory;
mod presenter;

pub use console::{ConsoleDiagnosticSink, OutputStyle};
pub use logger::JsonLinesLoggerSink;
pub use memory::MemoryDiagnosticSink;
pub use presenter::ConsolePresenter;

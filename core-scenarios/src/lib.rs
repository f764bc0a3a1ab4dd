//! # Scenarios
//!
//! Named demonstrations of where work and its continuations run, and of the
//! nested-future pitfall.
//!
//! ## Overview
//!
//! Each [`Scenario`] is a short sequence: take a diagnostic snapshot, submit
//! work under some scheduler and policy, register continuations, take more
//! snapshots. The [`ScenarioRunner`] turns every scenario into a zero-argument
//! trigger for the presentation layer.
//!
//! ## Usage
//!
//! ```no_run
//! use bridge_desktop::{ConsoleDiagnosticSink, ConsolePresenter, OutputStyle};
//! use core_runtime::config::SchedulingConfig;
//! use core_scenarios::ScenarioRunner;
//! use core_scheduler::ExecutionEnvironment;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let sink = Arc::new(ConsoleDiagnosticSink::new(OutputStyle::Text));
//! let env = ExecutionEnvironment::start(&SchedulingConfig::default(), sink).unwrap();
//! let runner = ScenarioRunner::new(env.clone());
//!
//! let mut presenter = ConsolePresenter::new();
//! runner.register_all(&mut presenter);
//! presenter.trigger("unwrap").unwrap();
//!
//! for report in runner.wait_settled(Duration::from_secs(5)).unwrap() {
//!     println!("{}: {:?}", report.scenario, report.outcome);
//! }
//! env.shutdown();
//! ```

pub mod error;
pub mod runner;
pub mod scenario;

pub use error::{Result, ScenarioError};
pub use runner::{ScenarioReport, ScenarioRunner};
pub use scenario::{Scenario, ANSWER};

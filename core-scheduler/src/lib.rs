//! # Core Scheduler
//!
//! Work items, schedulers and continuation capture.
//!
//! ## Overview
//!
//! Work is submitted through an [`ExecutionContext`] to either the
//! environment's affinity scheduler (one confined thread, FIFO) or a pool
//! scheduler (unordered workers). Submission returns a [`WorkFuture`]
//! immediately. Continuations registered on a future resume on the scheduler
//! captured from the registering context: the active affinity context if
//! there is one, otherwise a pool.
//!
//! A body that returns a future produces a future of a future;
//! [`WorkFuture::flatten`] turns it into a single-level future.
//!
//! ## Usage
//!
//! ```no_run
//! use bridge_traits::diagnostics::NullDiagnosticSink;
//! use core_runtime::config::SchedulingConfig;
//! use core_scheduler::{ExecutionEnvironment, SubmitOptions};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = SchedulingConfig::default();
//! let env = ExecutionEnvironment::start(&config, Arc::new(NullDiagnosticSink)).unwrap();
//!
//! env.run_on_affinity(|ctx| {
//!     let pool = ctx.default_pool();
//!     let work = ctx.submit_to(&pool, SubmitOptions::deny_child_attach(), |_| Ok(21));
//!     // Resumes on the affinity thread.
//!     let _doubled = work.then(ctx, |ctx, value| {
//!         ctx.observe("resumed");
//!         Ok(value * 2)
//!     });
//! })
//! .unwrap();
//!
//! env.shutdown();
//! ```
//!
//! ## Failures
//!
//! Errors raised by bodies are held by the future as [`WorkError`] and flow
//! through chained continuations until a [`recover`](WorkFuture::recover).
//! A failed future dropped without anyone observing it is reported to the
//! environment's diagnostic sink. Misuse, such as registering on a consumed
//! future, fails fast with [`SchedulingError::InvalidState`].

pub mod context;
pub mod error;
pub mod flatten;
pub mod future;
pub mod policy;
pub mod scheduler;
pub mod work;

pub use context::{ExecutionContext, ExecutionEnvironment};
pub use error::{Result, SchedulingError, WorkError};
pub use future::WorkFuture;
pub use policy::SubmitOptions;
pub use scheduler::{
    AffinityScheduler, Job, PoolScheduler, Scheduler, SchedulerHandle, SchedulerKind,
};
pub use work::{WorkId, WorkState};

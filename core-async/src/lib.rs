//! Tokio runtime layer for the continuation lab.
//!
//! Every other crate in the workspace goes through this crate instead of
//! depending on Tokio directly. It exposes the handful of runtime and
//! synchronization primitives the schedulers are built on.
//!
//! # Modules
//!
//! - `runtime`: runtime construction (`block_on`, worker pool runtimes)
//! - `sync`: channels used for affinity queues and event broadcasting
//!
//! # Examples
//!
//! ```rust
//! use core_async::runtime;
//!
//! let answer = runtime::block_on(async { 40 + 2 });
//! assert_eq!(answer, 42);
//! ```

pub mod runtime;
pub mod sync;

pub use runtime::block_on;
pub use tokio_util::sync::CancellationToken;

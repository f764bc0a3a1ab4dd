//! Synchronization primitives.
//!
//! Re-exports of `tokio::sync`. The unbounded `mpsc` channel backs affinity
//! queues (its `blocking_recv` lets a plain OS thread drain it in FIFO order)
//! and `broadcast` backs the diagnostic event bus.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! tx.send(1).unwrap();
//! tx.send(2).unwrap();
//! drop(tx);
//!
//! assert_eq!(rx.blocking_recv(), Some(1));
//! assert_eq!(rx.blocking_recv(), Some(2));
//! assert_eq!(rx.blocking_recv(), None);
//! ```

pub use tokio::sync::{broadcast, mpsc};

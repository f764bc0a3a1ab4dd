//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the continuation lab:
//! - Logging and tracing infrastructure
//! - Scheduler configuration
//! - Diagnostic event bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the scheduling core and its
//! hosts depend on. It establishes the logging conventions, the validated
//! configuration the schedulers are built from, and the broadcast channel
//! diagnostic observations travel through.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};

//! # Scheduler Configuration
//!
//! Provides the configuration the execution environment is built from.
//!
//! ## Overview
//!
//! The configuration uses a builder pattern to construct a
//! [`SchedulingConfig`]. Every setting has a default, and the builder
//! validates the combination up front so that a bad worker count or an empty
//! scheduler name fails before any thread is spawned.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::SchedulingConfig;
//!
//! let config = SchedulingConfig::builder()
//!     .affinity_name("ui")
//!     .pool_name("default-pool")
//!     .pool_workers(4)
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.pool_workers, 4);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::SchedulingConfig;
//!
//! // A pool without workers can never run anything.
//! let config = SchedulingConfig::builder()
//!     .pool_workers(0)
//!     .build()
//!     .expect("Should fail - pool needs at least one worker");
//! ```

use crate::error::{Error, Result};
use std::time::Duration;

/// Default name of the affinity context (the presentation layer's thread).
pub const DEFAULT_AFFINITY_NAME: &str = "ui";

/// Default name of the process-wide pool scheduler.
pub const DEFAULT_POOL_NAME: &str = "default-pool";

/// Upper bound on pool workers accepted by the builder.
pub const MAX_POOL_WORKERS: usize = 512;

/// Configuration for the execution environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingConfig {
    /// Name of the affinity context; also the name of its OS thread
    pub affinity_name: String,

    /// Name of the default pool; its threads are named `{pool_name}-worker-{n}`
    pub pool_name: String,

    /// Maximum number of bodies the default pool runs at the same time
    pub pool_workers: usize,

    /// How long `shutdown` waits for in-flight pool work
    pub shutdown_timeout: Duration,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            affinity_name: DEFAULT_AFFINITY_NAME.to_string(),
            pool_name: DEFAULT_POOL_NAME.to_string(),
            pool_workers: default_pool_workers(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl SchedulingConfig {
    /// Creates a new builder for constructing a `SchedulingConfig`.
    pub fn builder() -> SchedulingConfigBuilder {
        SchedulingConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Scheduler names are not empty and are distinct
    /// - Worker count is within `1..=MAX_POOL_WORKERS`
    /// - Shutdown timeout is not zero
    pub fn validate(&self) -> Result<()> {
        if self.affinity_name.trim().is_empty() {
            return Err(Error::Config(
                "Affinity context name cannot be empty".to_string(),
            ));
        }

        if self.pool_name.trim().is_empty() {
            return Err(Error::Config("Pool name cannot be empty".to_string()));
        }

        if self.affinity_name == self.pool_name {
            return Err(Error::Config(format!(
                "Affinity context and pool must have distinct names (both are `{}`)",
                self.pool_name
            )));
        }

        if self.pool_workers == 0 {
            return Err(Error::Config(
                "Pool must have at least one worker".to_string(),
            ));
        }

        if self.pool_workers > MAX_POOL_WORKERS {
            return Err(Error::Config(format!(
                "Pool worker count exceeds maximum of {}",
                MAX_POOL_WORKERS
            )));
        }

        if self.shutdown_timeout.is_zero() {
            return Err(Error::Config(
                "Shutdown timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_pool_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(2, 16)
}

/// Builder for [`SchedulingConfig`].
#[derive(Debug, Default)]
pub struct SchedulingConfigBuilder {
    affinity_name: Option<String>,
    pool_name: Option<String>,
    pool_workers: Option<usize>,
    shutdown_timeout: Option<Duration>,
}

impl SchedulingConfigBuilder {
    /// Sets the affinity context name.
    pub fn affinity_name(mut self, name: impl Into<String>) -> Self {
        self.affinity_name = Some(name.into());
        self
    }

    /// Sets the default pool name.
    pub fn pool_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = Some(name.into());
        self
    }

    /// Sets the number of pool workers.
    ///
    /// Default: available parallelism, clamped to `2..=16`.
    pub fn pool_workers(mut self, workers: usize) -> Self {
        self.pool_workers = Some(workers);
        self
    }

    /// Sets the shutdown timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Builds the configuration, validating it.
    pub fn build(self) -> Result<SchedulingConfig> {
        let defaults = SchedulingConfig::default();

        let config = SchedulingConfig {
            affinity_name: self.affinity_name.unwrap_or(defaults.affinity_name),
            pool_name: self.pool_name.unwrap_or(defaults.pool_name),
            pool_workers: self.pool_workers.unwrap_or(defaults.pool_workers),
            shutdown_timeout: self.shutdown_timeout.unwrap_or(defaults.shutdown_timeout),
        };

        config.validate()?;
        Ok(config)
    }
}

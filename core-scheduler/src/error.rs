use std::time::Duration;
use thiserror::Error;

/// Failure held by a completed work item.
///
/// Clonable because every continuation registered on a failed future
/// receives its own copy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkError {
    #[error("{0}")]
    Body(String),

    #[error("work body panicked: {0}")]
    Panicked(String),

    #[error("attached child failed: {0}")]
    ChildFailed(Box<WorkError>),

    #[error("scheduler `{0}` is shut down")]
    SchedulerShutdown(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl WorkError {
    /// Error raised by a work body.
    pub fn body(message: impl Into<String>) -> Self {
        Self::Body(message.into())
    }

    /// Short machine-readable kind, used in unobserved failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkError::Body(_) => "body",
            WorkError::Panicked(_) => "panic",
            WorkError::ChildFailed(_) => "child",
            WorkError::SchedulerShutdown(_) => "shutdown",
            WorkError::InvalidState(_) => "invalid-state",
        }
    }
}

/// Synchronous misuse or host-side wait failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("scheduler `{0}` is shut down")]
    SchedulerShutdown(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<SchedulingError> for WorkError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::InvalidState(message) => WorkError::InvalidState(message),
            SchedulingError::SchedulerShutdown(name) => WorkError::SchedulerShutdown(name),
            SchedulingError::TimedOut(_) => WorkError::InvalidState(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;

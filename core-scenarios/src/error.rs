use core_scheduler::SchedulingError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Scheduling failed: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error("Scenarios still running after {0:?}")]
    TimedOut(Duration),
}

pub type Result<T> = std::result::Result<T, ScenarioError>;

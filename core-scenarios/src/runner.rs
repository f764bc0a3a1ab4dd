//! Scenario runner.
//!
//! Registers one trigger per scenario with the presentation layer. A trigger
//! posts its scenario to the affinity thread and returns at once; the
//! scenario's final future is tracked so hosts can wait for everything that
//! was started to settle.

use crate::error::{Result, ScenarioError};
use crate::scenario::Scenario;
use bridge_traits::presentation::{ActionRegistry, Trigger};
use core_scheduler::{ExecutionEnvironment, SchedulingError, WorkError, WorkFuture};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Final outcome of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub outcome: std::result::Result<String, WorkError>,
}

#[derive(Default)]
struct Tracked {
    /// Triggers posted to the affinity thread
    posted: usize,
    /// Posted triggers that produced a future or failed to start
    started: usize,
    futures: Vec<(Scenario, WorkFuture<String>)>,
    failures: Vec<(Scenario, WorkError)>,
}

struct Shared {
    env: ExecutionEnvironment,
    tracked: Mutex<Tracked>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs scenarios on an [`ExecutionEnvironment`].
///
/// Cloning is cheap; clones share the tracked runs.
#[derive(Clone)]
pub struct ScenarioRunner {
    shared: Arc<Shared>,
}

impl ScenarioRunner {
    pub fn new(env: ExecutionEnvironment) -> Self {
        Self {
            shared: Arc::new(Shared {
                env,
                tracked: Mutex::new(Tracked::default()),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn environment(&self) -> &ExecutionEnvironment {
        &self.shared.env
    }

    /// Registers a trigger for every scenario, in [`Scenario::ALL`] order.
    pub fn register_all(&self, registry: &mut dyn ActionRegistry) {
        for scenario in Scenario::ALL {
            registry.register_action(scenario.label(), self.trigger_for(scenario));
        }
        info!(count = Scenario::ALL.len(), "Registered scenario actions");
    }

    /// Zero-argument trigger that starts `scenario`.
    pub fn trigger_for(&self, scenario: Scenario) -> Trigger {
        let runner = self.clone();
        Arc::new(move || {
            if let Err(e) = runner.start(scenario) {
                warn!(scenario = %scenario, error = %e, "Scenario could not be started");
            }
        })
    }

    /// Posts `scenario` to the affinity thread. Does not wait for it.
    pub fn start(&self, scenario: Scenario) -> Result<()> {
        self.shared.lock().posted += 1;

        let shared = Arc::clone(&self.shared);
        let posted = self.shared.env.run_on_affinity(move |root| {
            let ctx = root.with_scenario(scenario.label());
            info!(scenario = %scenario, "{}", scenario.description());

            let started = scenario.run(&ctx);

            let mut tracked = shared.lock();
            match started {
                Ok(future) => {
                    debug!(scenario = %scenario, work_id = %future.id(), "Scenario started");
                    tracked.futures.push((scenario, future));
                }
                Err(e) => {
                    error!(scenario = %scenario, error = %e, "Scenario failed to start");
                    tracked.failures.push((scenario, e.into()));
                }
            }
            tracked.started += 1;
            drop(tracked);
            shared.changed.notify_all();
        });

        if let Err(e) = posted {
            self.shared.lock().posted -= 1;
            return Err(ScenarioError::from(e));
        }
        Ok(())
    }

    /// Waits for every started scenario to finish and returns their outcomes
    /// in start order. Reports are drained; a second call only sees
    /// scenarios started in between.
    pub fn wait_settled(&self, timeout: Duration) -> Result<Vec<ScenarioReport>> {
        let deadline = Instant::now() + timeout;

        let tracked = self.shared.lock();
        let (mut tracked, result) = self
            .shared
            .changed
            .wait_timeout_while(tracked, timeout, |tracked| tracked.started < tracked.posted)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && tracked.started < tracked.posted {
            return Err(ScenarioError::TimedOut(timeout));
        }

        let futures = std::mem::take(&mut tracked.futures);
        let failures = std::mem::take(&mut tracked.failures);
        tracked.posted -= tracked.started;
        tracked.started = 0;
        drop(tracked);

        let mut reports: Vec<ScenarioReport> = failures
            .into_iter()
            .map(|(scenario, error)| ScenarioReport {
                scenario,
                outcome: Err(error),
            })
            .collect();

        for (scenario, future) in futures {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let outcome = future.wait(remaining).map_err(|e| match e {
                SchedulingError::TimedOut(_) => ScenarioError::TimedOut(timeout),
                other => ScenarioError::from(other),
            })?;
            reports.push(ScenarioReport { scenario, outcome });
        }

        Ok(reports)
    }
}

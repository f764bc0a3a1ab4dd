//! The demonstrations.
//!
//! Every scenario starts on the affinity thread with the affinity context
//! active, records diagnostic snapshots along the way, and hands back the
//! future of its last step. The value of that future is a one-line summary.

use crate::error::ScenarioError;
use core_scheduler::{
    ExecutionContext, SchedulerHandle, SchedulingError, SubmitOptions, WorkError,
    WorkFuture,
};
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

/// How long inner bodies take, so that outer futures settle first.
const INNER_DELAY: Duration = Duration::from_millis(50);

/// Value the nested bodies produce.
pub const ANSWER: u32 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    PoolThenResume,
    NestedPoolThenResume,
    ResumeWithoutAffinity,
    AffinityAmbientInheritance,
    FutureOfFuture,
    Unwrap,
    ManualDoubleResolve,
    FaultPropagation,
    UnobservedFault,
    AttachedChildren,
}

impl Scenario {
    pub const ALL: [Scenario; 10] = [
        Scenario::PoolThenResume,
        Scenario::NestedPoolThenResume,
        Scenario::ResumeWithoutAffinity,
        Scenario::AffinityAmbientInheritance,
        Scenario::FutureOfFuture,
        Scenario::Unwrap,
        Scenario::ManualDoubleResolve,
        Scenario::FaultPropagation,
        Scenario::UnobservedFault,
        Scenario::AttachedChildren,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Scenario::PoolThenResume => "pool-then-resume",
            Scenario::NestedPoolThenResume => "nested-pool-then-resume",
            Scenario::ResumeWithoutAffinity => "resume-without-affinity",
            Scenario::AffinityAmbientInheritance => "affinity-ambient-inheritance",
            Scenario::FutureOfFuture => "future-of-future",
            Scenario::Unwrap => "unwrap",
            Scenario::ManualDoubleResolve => "manual-double-resolve",
            Scenario::FaultPropagation => "fault-propagation",
            Scenario::UnobservedFault => "unobserved-fault",
            Scenario::AttachedChildren => "attached-children",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Scenario::PoolThenResume => {
                "Pool body awaited from the affinity context resumes on the affinity thread"
            }
            Scenario::NestedPoolThenResume => {
                "An extra pool layer does not change where the continuation resumes"
            }
            Scenario::ResumeWithoutAffinity => {
                "A continuation registered on a pool worker resumes on the pool"
            }
            Scenario::AffinityAmbientInheritance => {
                "Work submitted from an affinity body inherits the affinity scheduler"
            }
            Scenario::FutureOfFuture => {
                "Continuing on a nested future hands over the inner handle, not the value"
            }
            Scenario::Unwrap => "Flattening the nested future hands over the value",
            Scenario::ManualDoubleResolve => {
                "Resolving the outer future and then the inner one by hand"
            }
            Scenario::FaultPropagation => {
                "A failure skips success continuations until it is recovered"
            }
            Scenario::UnobservedFault => {
                "A failed future nobody observes is reported to the diagnostic sink"
            }
            Scenario::AttachedChildren => {
                "Without deny-child-attach the parent completes only after its child"
            }
        }
    }

    /// Starts the scenario from `ctx` and returns the future of its last step.
    pub fn run(self, ctx: &ExecutionContext) -> Result<WorkFuture<String>, SchedulingError> {
        match self {
            Scenario::PoolThenResume => pool_then_resume(ctx),
            Scenario::NestedPoolThenResume => nested_pool_then_resume(ctx),
            Scenario::ResumeWithoutAffinity => resume_without_affinity(ctx),
            Scenario::AffinityAmbientInheritance => affinity_ambient_inheritance(ctx),
            Scenario::FutureOfFuture => future_of_future(ctx),
            Scenario::Unwrap => unwrap(ctx),
            Scenario::ManualDoubleResolve => manual_double_resolve(ctx),
            Scenario::FaultPropagation => fault_propagation(ctx),
            Scenario::UnobservedFault => Ok(unobserved_fault(ctx)),
            Scenario::AttachedChildren => attached_children(ctx),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.label() == s)
            .ok_or_else(|| ScenarioError::UnknownScenario(s.to_string()))
    }
}

fn pool(ctx: &ExecutionContext) -> SchedulerHandle {
    ctx.default_pool()
}

/// Inner work shared by the nested scenarios.
fn delayed_answer(ctx: &ExecutionContext) -> WorkFuture<u32> {
    ctx.submit_with(SubmitOptions::deny_child_attach(), |ctx| {
        thread::sleep(INNER_DELAY);
        ctx.observe("inner body");
        Ok(ANSWER)
    })
}

fn pool_then_resume(ctx: &ExecutionContext) -> Result<WorkFuture<String>, SchedulingError> {
    ctx.observe("before submit");

    let work = ctx.submit_to(&pool(ctx), SubmitOptions::deny_child_attach(), |ctx| {
        ctx.observe("pool body");
        Ok(())
    });

    work.then(ctx, |ctx, ()| {
        ctx.observe("after resume");
        Ok(format!("resumed on affinity thread: {}", ctx.on_affinity_thread()))
    })
}

fn nested_pool_then_resume(ctx: &ExecutionContext) -> Result<WorkFuture<String>, SchedulingError> {
    ctx.observe("before submit");

    let outer = ctx.submit_to(&pool(ctx), SubmitOptions::deny_child_attach(), |ctx| {
        ctx.observe("outer pool body");
        Ok(ctx.submit_with(SubmitOptions::deny_child_attach(), |ctx| {
            ctx.observe("inner pool body");
            Ok(())
        }))
    });

    outer.flatten()?.then(ctx, |ctx, ()| {
        ctx.observe("after resume");
        Ok(format!("resumed on affinity thread: {}", ctx.on_affinity_thread()))
    })
}

fn resume_without_affinity(ctx: &ExecutionContext) -> Result<WorkFuture<String>, SchedulingError> {
    ctx.observe("before submit");

    let outer = ctx.submit_to(&pool(ctx), SubmitOptions::deny_child_attach(), |ctx| {
        ctx.observe("pool body registers continuation");
        let inner = ctx.submit_with(SubmitOptions::deny_child_attach(), |ctx| {
            ctx.observe("inner pool body");
            Ok(())
        });
        inner
            .then(ctx, |ctx, ()| {
                ctx.observe("after resume");
                Ok(format!("resumed on affinity thread: {}", ctx.on_affinity_thread()))
            })
            .map_err(WorkError::from)
    });

    outer.flatten()
}

fn affinity_ambient_inheritance(
    ctx: &ExecutionContext,
) -> Result<WorkFuture<String>, SchedulingError> {
    ctx.observe("before submit");

    let ui = ctx.affinity_scheduler();
    let outer = ctx.submit_to(&ui, SubmitOptions::deny_child_attach(), |ctx| {
        ctx.observe("affinity body");
        Ok(ctx.submit(|ctx| {
            ctx.observe("nested submit");
            let ambient = ctx
                .ambient_scheduler()
                .map(|scheduler| scheduler.name().to_string())
                .unwrap_or_default();
            Ok(format!("nested work ran on ambient scheduler `{}`", ambient))
        }))
    });

    outer.flatten()
}

fn future_of_future(ctx: &ExecutionContext) -> Result<WorkFuture<String>, SchedulingError> {
    ctx.observe("before submit");

    let outer = ctx.submit_to(&pool(ctx), SubmitOptions::deny_child_attach(), |ctx| {
        ctx.observe("outer body");
        Ok(delayed_answer(ctx))
    });

    outer.then(ctx, |ctx, inner| {
        ctx.observe("continuation received handle");
        Ok(format!("continuation received {} instead of {}", inner, ANSWER))
    })
}

fn unwrap(ctx: &ExecutionContext) -> Result<WorkFuture<String>, SchedulingError> {
    ctx.observe("before submit");

    let outer = ctx.submit_to(&pool(ctx), SubmitOptions::deny_child_attach(), |ctx| {
        ctx.observe("outer body");
        Ok(delayed_answer(ctx))
    });

    outer.flatten()?.then(ctx, |ctx, value| {
        ctx.observe("continuation received value");
        Ok(format!("continuation received {}", value))
    })
}

fn manual_double_resolve(ctx: &ExecutionContext) -> Result<WorkFuture<String>, SchedulingError> {
    ctx.observe("before submit");

    let outer = ctx.submit_to(&pool(ctx), SubmitOptions::deny_child_attach(), |ctx| {
        ctx.observe("outer body");
        Ok(delayed_answer(ctx))
    });

    let resolved = outer.then(ctx, |ctx, inner| {
        ctx.observe("outer resolved");
        inner
            .then(ctx, |ctx, value| {
                ctx.observe("inner resolved");
                Ok(format!("resolved by hand to {}", value))
            })
            .map_err(WorkError::from)
    })?;

    resolved.flatten()
}

fn fault_propagation(ctx: &ExecutionContext) -> Result<WorkFuture<String>, SchedulingError> {
    ctx.observe("before submit");

    let failing = ctx.submit_to(&pool(ctx), SubmitOptions::deny_child_attach(), |ctx| {
        ctx.observe("failing body");
        Err::<u32, _>(WorkError::body("simulated I/O failure"))
    });

    failing
        .then(ctx, |ctx, value| {
            ctx.observe("success continuation");
            Ok(format!("unexpected value {}", value))
        })?
        .recover(ctx, |ctx, error| {
            ctx.observe("recovered");
            Ok(format!("recovered from: {}", error))
        })
}

fn unobserved_fault(ctx: &ExecutionContext) -> WorkFuture<String> {
    ctx.observe("before submit");

    let failing = ctx.submit_to(&pool(ctx), SubmitOptions::deny_child_attach(), |ctx| {
        ctx.observe("failing body");
        Err::<(), _>(WorkError::body("nobody is listening"))
    });
    drop(failing);

    ctx.submit_to(&pool(ctx), SubmitOptions::deny_child_attach(), |_| {
        Ok("failing future dropped without an observer".to_string())
    })
}

fn attached_children(ctx: &ExecutionContext) -> Result<WorkFuture<String>, SchedulingError> {
    ctx.observe("before submit");

    let parent = ctx.submit_to(&pool(ctx), SubmitOptions::default(), |ctx| {
        ctx.observe("parent body");
        let _child = ctx.submit(|ctx| {
            thread::sleep(INNER_DELAY);
            ctx.observe("attached child");
            Ok(())
        });
        Ok(())
    });

    parent.then(ctx, |ctx, ()| {
        ctx.observe("parent completed");
        Ok("parent completed after its attached child".to_string())
    })
}

use bridge_desktop::MemoryDiagnosticSink;
use core_async::CancellationToken;
use core_runtime::config::SchedulingConfig;
use core_scheduler::{
    ExecutionContext, ExecutionEnvironment, Scheduler, SchedulingError, SubmitOptions,
    WorkError, WorkFuture, WorkState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

fn environment(name: &str) -> (ExecutionEnvironment, Arc<MemoryDiagnosticSink>) {
    let sink = Arc::new(MemoryDiagnosticSink::new());
    let config = SchedulingConfig::builder()
        .affinity_name(format!("{}-ui", name))
        .pool_name(format!("{}-pool", name))
        .pool_workers(4)
        .build()
        .unwrap();
    let env = ExecutionEnvironment::start(&config, sink.clone()).unwrap();
    (env, sink)
}

/// Runs `action` on the affinity thread and hands back what it returns.
fn on_affinity<R, F>(env: &ExecutionEnvironment, action: F) -> R
where
    R: Send + 'static,
    F: FnOnce(&ExecutionContext) -> R + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    env.run_on_affinity(move |ctx| {
        tx.send(action(ctx)).unwrap();
    })
    .unwrap();
    rx.recv_timeout(TIMEOUT).unwrap()
}

fn thread_name() -> String {
    thread::current().name().unwrap_or_default().to_string()
}

#[test]
fn test_state_sequences() {
    let (env, _sink) = environment("states");
    let ctx = env.root_context();

    let ok = ctx.submit(|_| Ok(1));
    let failed = ctx.submit::<u32, _>(|_| Err(WorkError::body("nope")));

    assert_eq!(ok.wait(TIMEOUT).unwrap(), Ok(1));
    assert_eq!(failed.wait(TIMEOUT).unwrap(), Err(WorkError::body("nope")));

    assert_eq!(
        ok.history(),
        vec![WorkState::Pending, WorkState::Running, WorkState::Completed]
    );
    assert_eq!(
        failed.history(),
        vec![WorkState::Pending, WorkState::Running, WorkState::Failed]
    );
    env.shutdown();
}

#[test]
fn test_continuation_proxies_follow_state_sequence() {
    let (env, _sink) = environment("proxy-states");
    let ctx = env.root_context();

    let outer = ctx.submit(|ctx| Ok(ctx.submit_with(SubmitOptions::deny_child_attach(), |_| Ok(5))));
    let flat = outer.flatten().unwrap();
    let next = flat.then(&ctx, |_, v| Ok(v + 1)).unwrap();

    assert_eq!(next.wait(TIMEOUT).unwrap(), Ok(6));
    for history in [flat.history(), next.history()] {
        assert_eq!(
            history,
            vec![WorkState::Pending, WorkState::Running, WorkState::Completed]
        );
    }
    env.shutdown();
}

#[test]
fn test_registration_after_completion_fires_once() {
    let (env, _sink) = environment("late-register");
    let ctx = env.root_context();
    let calls = Arc::new(AtomicUsize::new(0));

    let work = ctx.submit(|_| Ok(3));
    work.wait(TIMEOUT).unwrap().unwrap();
    assert!(work.is_terminal());

    let c = calls.clone();
    let after = work
        .on_complete(&ctx, move |_, outcome| {
            c.fetch_add(1, Ordering::SeqCst);
            outcome
        })
        .unwrap();

    assert_eq!(after.wait(TIMEOUT).unwrap(), Ok(3));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    env.shutdown();
}

#[test]
fn test_registration_racing_completion_never_misses() {
    let (env, _sink) = environment("race");
    let ctx = env.root_context();
    let calls = Arc::new(AtomicUsize::new(0));

    let continuations: Vec<_> = (0..200)
        .map(|n| {
            let work = ctx.submit(move |_| Ok(n));
            let c = calls.clone();
            work.then(&ctx, move |_, value| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
            .unwrap()
        })
        .collect();

    for (n, continuation) in continuations.iter().enumerate() {
        assert_eq!(continuation.wait(TIMEOUT).unwrap(), Ok(n));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 200);
    env.shutdown();
}

#[test]
fn test_pool_body_resumes_on_affinity_context() {
    let (env, _sink) = environment("resume-ui");
    let affinity = env.affinity();

    let resumed = on_affinity(&env, |ctx| {
        let pool = ctx.default_pool();
        let work = ctx.submit_to(&pool, SubmitOptions::deny_child_attach(), |ctx| {
            Ok((thread_name(), ctx.on_affinity_thread()))
        });
        work.then(ctx, |ctx, body| Ok((body, ctx.on_affinity_thread(), thread_name())))
            .unwrap()
    });

    let ((body_thread, body_on_affinity), resumed_on_affinity, resumed_thread) =
        resumed.wait(TIMEOUT).unwrap().unwrap();
    assert!(body_thread.starts_with("resume-ui-pool-worker-"));
    assert!(!body_on_affinity);
    assert!(resumed_on_affinity);
    assert_eq!(resumed_thread, affinity.name());
    env.shutdown();
}

#[test]
fn test_affinity_body_resumes_on_affinity_context() {
    let (env, _sink) = environment("resume-ui-2");

    let resumed = on_affinity(&env, |ctx| {
        let ui = ctx.affinity_scheduler();
        let work = ctx.submit_to(&ui, SubmitOptions::default(), |ctx| Ok(ctx.on_affinity_thread()));
        work.then(ctx, |ctx, body_on_affinity| {
            Ok((body_on_affinity, ctx.on_affinity_thread()))
        })
        .unwrap()
    });

    assert_eq!(resumed.wait(TIMEOUT).unwrap(), Ok((true, true)));
    env.shutdown();
}

#[test]
fn test_extra_submission_layers_do_not_change_resume_target() {
    let (env, _sink) = environment("layers");

    let resumed = on_affinity(&env, |ctx| {
        let pool = ctx.default_pool();
        let outer = ctx.submit_to(&pool, SubmitOptions::deny_child_attach(), |ctx| {
            let inner = ctx.submit_with(SubmitOptions::deny_child_attach(), |ctx| {
                let innermost = ctx.submit_with(SubmitOptions::deny_child_attach(), |_| Ok(7));
                Ok(innermost)
            });
            Ok(inner)
        });

        outer
            .flatten()
            .unwrap()
            .flatten()
            .unwrap()
            .then(ctx, |ctx, value| Ok((value, ctx.on_affinity_thread())))
            .unwrap()
    });

    assert_eq!(resumed.wait(TIMEOUT).unwrap(), Ok((7, true)));
    env.shutdown();
}

#[test]
fn test_registration_without_affinity_resumes_on_pool() {
    let (env, _sink) = environment("resume-pool");
    let root = env.root_context();
    let pool = env.default_pool();

    let outer = root.submit_to(&pool, SubmitOptions::deny_child_attach(), |ctx| {
        let work = ctx.submit_with(SubmitOptions::deny_child_attach(), |_| Ok(thread_name()));
        work.on_complete(ctx, |ctx, body_thread| {
            Ok((body_thread?, thread_name(), ctx.on_affinity_thread()))
        })
        .map_err(WorkError::from)
    });

    let (body_thread, resumed_thread, on_affinity) =
        outer.flatten().unwrap().wait(TIMEOUT).unwrap().unwrap();
    assert!(body_thread.starts_with("resume-pool-pool-worker-"));
    assert!(resumed_thread.starts_with("resume-pool-pool-worker-"));
    assert!(!on_affinity);
    env.shutdown();
}

#[test]
fn test_registration_from_root_context_resumes_on_pool() {
    let (env, _sink) = environment("resume-root");
    let ctx = env.root_context();

    let resumed = ctx
        .submit(|_| Ok(()))
        .then(&ctx, |ctx, _| Ok((thread_name(), ctx.on_affinity_thread())))
        .unwrap();

    let (name, on_affinity) = resumed.wait(TIMEOUT).unwrap().unwrap();
    assert!(name.starts_with("resume-root-pool-worker-"));
    assert!(!on_affinity);
    env.shutdown();
}

#[test]
fn test_flatten_yields_inner_value() {
    let (env, _sink) = environment("flatten");
    let ctx = env.root_context();

    let outer: WorkFuture<WorkFuture<u32>> = ctx.submit(|ctx| {
        Ok(ctx.submit_with(SubmitOptions::deny_child_attach(), |_| {
            thread::sleep(Duration::from_millis(30));
            Ok(42)
        }))
    });

    let flat = outer.flatten().unwrap();
    assert_eq!(flat.wait(TIMEOUT).unwrap(), Ok(42));
    env.shutdown();
}

#[test]
fn test_flatten_propagates_inner_failure() {
    let (env, _sink) = environment("flatten-inner-fail");
    let ctx = env.root_context();

    let outer = ctx.submit(|ctx| {
        Ok(ctx.submit_with::<u32, _>(SubmitOptions::deny_child_attach(), |_| {
            Err(WorkError::body("inner broke"))
        }))
    });

    assert_eq!(
        outer.flatten().unwrap().wait(TIMEOUT).unwrap(),
        Err(WorkError::body("inner broke"))
    );
    env.shutdown();
}

#[test]
fn test_flatten_short_circuits_outer_failure() {
    let (env, _sink) = environment("flatten-outer-fail");
    let ctx = env.root_context();
    let (inner_tx, inner_rx) = mpsc::channel();

    let outer: WorkFuture<WorkFuture<u32>> = ctx.submit(move |ctx| {
        let inner = ctx.submit_with(SubmitOptions::deny_child_attach(), |_| Ok(1));
        inner_tx.send(inner).unwrap();
        Err(WorkError::body("outer broke"))
    });

    let flat = outer.flatten().unwrap();
    assert_eq!(flat.wait(TIMEOUT).unwrap(), Err(WorkError::body("outer broke")));

    let inner = inner_rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(inner.wait(TIMEOUT).unwrap(), Ok(1));
    assert_eq!(inner.registration_count(), 0);
    env.shutdown();
}

#[test]
fn test_without_flatten_continuation_sees_handle() {
    let (env, _sink) = environment("nested");
    let ctx = env.root_context();

    let outer = ctx.submit(|ctx| Ok(ctx.submit_with(SubmitOptions::deny_child_attach(), |_| Ok(42))));
    let seen = outer
        .then(&ctx, |_, inner: WorkFuture<u32>| Ok(inner.to_string()))
        .unwrap();

    let rendered = seen.wait(TIMEOUT).unwrap().unwrap();
    assert!(rendered.starts_with("WorkFuture<u32>"), "{}", rendered);
    env.shutdown();
}

#[test]
fn test_deny_child_attach_submission_returns_immediately() {
    let (env, _sink) = environment("no-block");
    let ctx = env.root_context();
    let pool = env.default_pool();

    let gate = Arc::new(RwLock::new(()));
    let held = gate.write().unwrap();

    let items: Vec<_> = (0..16)
        .map(|n| {
            let gate = gate.clone();
            ctx.submit_to(&pool, SubmitOptions::deny_child_attach(), move |_| {
                let _open = gate.read().unwrap();
                Ok(n)
            })
        })
        .collect();

    assert!(items.iter().all(|item| !item.is_terminal()));
    assert!(items.iter().all(|item| !item.is_attached()));
    drop(held);

    for (n, item) in items.iter().enumerate() {
        assert_eq!(item.wait(TIMEOUT).unwrap(), Ok(n));
    }
    env.shutdown();
}

#[test]
fn test_same_continuation_registered_twice_runs_twice() {
    let (env, _sink) = environment("twice");
    let ctx = env.root_context();
    let calls = Arc::new(AtomicUsize::new(0));

    let c = calls.clone();
    let continuation = move |_: &ExecutionContext, outcome: Result<u32, WorkError>| {
        c.fetch_add(1, Ordering::SeqCst);
        outcome.map(|_| ())
    };

    let work = ctx.submit(|_| Ok(1_u32));
    let first = work.on_complete(&ctx, continuation.clone()).unwrap();
    let second = work.on_complete(&ctx, continuation).unwrap();

    first.wait(TIMEOUT).unwrap().unwrap();
    second.wait(TIMEOUT).unwrap().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(work.registration_count(), 2);
    env.shutdown();
}

#[test]
fn test_affinity_queue_is_fifo() {
    let (env, _sink) = environment("fifo");
    let seen = Arc::new(Mutex::new(Vec::new()));

    let items = {
        let seen = seen.clone();
        on_affinity(&env, move |ctx| {
            let ui = ctx.affinity_scheduler();
            (0..25)
                .map(|n| {
                    let seen = seen.clone();
                    ctx.submit_to(&ui, SubmitOptions::deny_child_attach(), move |_| {
                        seen.lock().unwrap().push(n);
                        Ok(())
                    })
                })
                .collect::<Vec<_>>()
        })
    };

    for item in &items {
        item.wait(TIMEOUT).unwrap().unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), (0..25).collect::<Vec<_>>());
    env.shutdown();
}

#[test]
fn test_nested_submit_inherits_affinity_as_ambient() {
    let (env, sink) = environment("ambient");

    let outer = on_affinity(&env, |root| {
        let ctx = root.with_scenario("ambient-demo");
        let ui = ctx.affinity_scheduler();
        ctx.submit_to(&ui, SubmitOptions::deny_child_attach(), |ctx| {
            ctx.observe("outer body");
            Ok(ctx.submit(|ctx| {
                ctx.observe("nested body");
                Ok(ctx.on_affinity_thread())
            }))
        })
    });

    assert_eq!(outer.flatten().unwrap().wait(TIMEOUT).unwrap(), Ok(true));

    let nested = sink.find("nested body").unwrap();
    assert!(nested.is_affinity_thread);
    assert_eq!(nested.ambient_scheduler_name.as_deref(), Some("ambient-ui"));
    assert_eq!(nested.active_affinity_context_name.as_deref(), Some("ambient-ui"));
    assert_eq!(nested.default_scheduler_name, "ambient-pool");
    assert_eq!(nested.scenario.as_deref(), Some("ambient-demo"));
    env.shutdown();
}

#[test]
fn test_pool_body_snapshot() {
    let (env, sink) = environment("snapshot");

    on_affinity(&env, |ctx| {
        ctx.observe("before submit");
        let pool = ctx.default_pool();
        ctx.submit_to(&pool, SubmitOptions::deny_child_attach(), |ctx| {
            ctx.observe("inside body");
            Ok(())
        })
    })
    .wait(TIMEOUT)
    .unwrap()
    .unwrap();

    let before = sink.find("before submit").unwrap();
    assert!(before.is_affinity_thread);
    assert_eq!(before.active_affinity_context_name.as_deref(), Some("snapshot-ui"));
    assert_eq!(before.ambient_scheduler_name, None);

    let inside = sink.find("inside body").unwrap();
    assert!(!inside.is_affinity_thread);
    assert_eq!(inside.active_affinity_context_name, None);
    assert_eq!(inside.ambient_scheduler_name.as_deref(), Some("snapshot-pool"));
    assert_ne!(inside.logical_thread_id, before.logical_thread_id);
    env.shutdown();
}

#[test]
fn test_errors_skip_then_until_recover() {
    let (env, _sink) = environment("errors");
    let ctx = env.root_context();
    let skipped = Arc::new(AtomicUsize::new(0));

    let s = skipped.clone();
    let recovered = ctx
        .submit::<u32, _>(|_| Err(WorkError::body("disk full")))
        .then(&ctx, move |_, value| {
            s.fetch_add(1, Ordering::SeqCst);
            Ok(value + 1)
        })
        .unwrap()
        .recover(&ctx, |_, error| {
            assert_eq!(error, WorkError::body("disk full"));
            Ok(0)
        })
        .unwrap();

    assert_eq!(recovered.wait(TIMEOUT).unwrap(), Ok(0));
    assert_eq!(skipped.load(Ordering::SeqCst), 0);
    env.shutdown();
}

#[test]
fn test_panicking_body_fails_future() {
    let (env, _sink) = environment("panics");
    let ctx = env.root_context();

    let work = ctx.submit::<u32, _>(|_| panic!("kaboom"));
    assert_eq!(
        work.wait(TIMEOUT).unwrap(),
        Err(WorkError::Panicked("kaboom".to_string()))
    );
    assert_eq!(work.state(), WorkState::Failed);
    env.shutdown();
}

#[test]
fn test_consumed_future_rejects_registration() {
    let (env, _sink) = environment("misuse");
    let ctx = env.root_context();

    let work = ctx.submit(|_| Ok(9));
    work.wait(TIMEOUT).unwrap().unwrap();

    assert_eq!(work.consume(), Ok(Ok(9)));
    assert!(matches!(work.consume(), Err(SchedulingError::InvalidState(_))));
    assert!(matches!(
        work.then(&ctx, |_, v| Ok(v)),
        Err(SchedulingError::InvalidState(_))
    ));
    assert!(matches!(
        work.clone().wait(TIMEOUT),
        Err(SchedulingError::InvalidState(_))
    ));
    env.shutdown();
}

#[test]
fn test_consuming_pending_future_is_invalid() {
    let (env, _sink) = environment("misuse-pending");
    let ctx = env.root_context();
    let gate = Arc::new(RwLock::new(()));
    let held = gate.write().unwrap();

    let g = gate.clone();
    let work = ctx.submit(move |_| {
        let _open = g.read().unwrap();
        Ok(())
    });
    assert!(matches!(work.consume(), Err(SchedulingError::InvalidState(_))));

    drop(held);
    work.wait(TIMEOUT).unwrap().unwrap();
    env.shutdown();
}

#[test]
fn test_unobserved_failure_is_reported() {
    let (env, sink) = environment("unobserved");
    let ctx = env.root_context().with_scenario("unobserved-fault");

    let work = ctx.submit::<u32, _>(|_| Err(WorkError::body("nobody listened")));
    assert!(work.wait_settled(TIMEOUT));
    drop(work);

    assert!(sink.wait_for_errors(1, TIMEOUT));
    let report = &sink.errors()[0];
    assert_eq!(report.scenario.as_deref(), Some("unobserved-fault"));
    assert_eq!(report.error_kind, "body");
    assert_eq!(report.message, "nobody listened");
    env.shutdown();
}

#[test]
fn test_observed_failure_is_not_reported() {
    let (env, sink) = environment("observed");
    let ctx = env.root_context();

    let work = ctx.submit::<u32, _>(|_| Err(WorkError::body("seen")));
    assert_eq!(work.wait(TIMEOUT).unwrap(), Err(WorkError::body("seen")));
    drop(work);

    let recovered = ctx
        .submit::<u32, _>(|_| Err(WorkError::body("handled")))
        .recover(&ctx, |_, _| Ok(1))
        .unwrap();
    assert_eq!(recovered.wait(TIMEOUT).unwrap(), Ok(1));
    drop(recovered);

    assert!(!sink.wait_for_errors(1, Duration::from_millis(200)));
    env.shutdown();
}

#[test]
fn test_attached_child_holds_parent_open() {
    let (env, _sink) = environment("attach");
    let ctx = env.root_context();
    let gate = Arc::new(RwLock::new(()));
    let held = gate.write().unwrap();
    let (child_tx, child_rx) = mpsc::channel();

    let g = gate.clone();
    let parent = ctx.submit(move |ctx| {
        let child = ctx.submit(move |_| {
            let _open = g.read().unwrap();
            Ok(2)
        });
        child_tx.send(child).unwrap();
        Ok(1)
    });

    let child = child_rx.recv_timeout(TIMEOUT).unwrap();
    assert!(child.is_attached());
    assert!(!parent.wait_settled(Duration::from_millis(100)));
    assert_eq!(parent.state(), WorkState::Running);

    drop(held);
    assert_eq!(parent.wait(TIMEOUT).unwrap(), Ok(1));
    assert!(child.is_terminal());
    env.shutdown();
}

#[test]
fn test_attached_child_failure_fails_parent() {
    let (env, sink) = environment("attach-fail");
    let ctx = env.root_context();

    let parent = ctx.submit(|ctx| {
        let _child = ctx.submit::<u32, _>(|_| Err(WorkError::body("child broke")));
        Ok(1)
    });

    assert_eq!(
        parent.wait(TIMEOUT).unwrap(),
        Err(WorkError::ChildFailed(Box::new(WorkError::body("child broke"))))
    );
    assert!(!sink.wait_for_errors(1, Duration::from_millis(200)));
    env.shutdown();
}

#[test]
fn test_child_failure_displaced_by_body_failure_is_reported() {
    let (env, sink) = environment("attach-both-fail");
    let ctx = env.root_context().with_scenario("both-fail");

    let parent = ctx.submit::<u32, _>(|ctx| {
        let child = ctx.submit::<u32, _>(|_| Err(WorkError::body("child failure")));
        child.wait_settled(TIMEOUT);
        Err(WorkError::body("parent failure"))
    });

    assert_eq!(
        parent.wait(TIMEOUT).unwrap(),
        Err(WorkError::body("parent failure"))
    );
    assert!(sink.wait_for_errors(1, TIMEOUT));
    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].scenario.as_deref(), Some("both-fail"));
    assert_eq!(errors[0].message, "child failure");
    env.shutdown();
}

#[test]
fn test_denied_child_does_not_hold_parent() {
    let (env, _sink) = environment("deny");
    let ctx = env.root_context();
    let gate = Arc::new(RwLock::new(()));
    let held = gate.write().unwrap();
    let (child_tx, child_rx) = mpsc::channel();

    let g = gate.clone();
    let parent = ctx.submit(move |ctx| {
        let child = ctx.submit_with(SubmitOptions::deny_child_attach(), move |_| {
            let _open = g.read().unwrap();
            Ok(2)
        });
        child_tx.send(child).unwrap();
        Ok(1)
    });

    assert_eq!(parent.wait(TIMEOUT).unwrap(), Ok(1));
    let child = child_rx.recv_timeout(TIMEOUT).unwrap();
    assert!(!child.is_attached());
    assert!(!child.is_terminal());

    drop(held);
    assert_eq!(child.wait(TIMEOUT).unwrap(), Ok(2));
    env.shutdown();
}

#[test]
fn test_cancellation_token_reaches_body() {
    let (env, _sink) = environment("cancel");
    let ctx = env.root_context();
    let token = CancellationToken::new();
    token.cancel();

    let work = ctx.submit_with(
        SubmitOptions::deny_child_attach().with_cancellation(token),
        |ctx| Ok(ctx.cancellation().is_cancelled()),
    );
    assert_eq!(work.wait(TIMEOUT).unwrap(), Ok(true));
    env.shutdown();
}

#[test]
fn test_submit_after_shutdown_fails_without_running() {
    let (env, _sink) = environment("closed");
    let ctx = env.root_context();
    env.shutdown();

    let work = ctx.submit(|_| Ok(1));
    assert_eq!(
        work.wait(TIMEOUT).unwrap(),
        Err(WorkError::SchedulerShutdown("closed-pool".to_string()))
    );
    assert_eq!(work.history(), vec![WorkState::Pending, WorkState::Failed]);
    assert!(env.run_on_affinity(|_| {}).is_err());
}

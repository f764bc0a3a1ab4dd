//! Console host for the continuation lab.
//!
//! Registers every scenario with a console presenter, triggers them all, and
//! prints the diagnostics they produce.
//!
//! Run with:
//! ```bash
//! # Pretty log format (default in debug)
//! cargo run
//!
//! # JSON logs with a custom filter
//! cargo run -- json "core_scheduler=debug"
//! ```
//!
//! Environment:
//! - `CONTINUATION_LAB_DIAGNOSTICS=json` prints diagnostics as JSON lines
//! - `CONTINUATION_LAB_SCENARIOS=unwrap,future-of-future` runs only those
//! - `CONTINUATION_LAB_LOG_FILE=<path>` mirrors log events into a file
//! - `CONTINUATION_LAB_POOL_WORKERS=<n>` sizes the default pool

use anyhow::{bail, Context, Result};
use bridge_desktop::{ConsoleDiagnosticSink, ConsolePresenter, JsonLinesLoggerSink, OutputStyle};
use bridge_traits::diagnostics::DiagnosticSink;
use bridge_traits::log::LogLevel;
use core_runtime::config::SchedulingConfig;
use core_runtime::events::{DiagnosticEvent, EventBus, RecvError};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_scenarios::{Scenario, ScenarioRunner};
use core_scheduler::ExecutionEnvironment;
use std::env;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);
const PRINTER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let format = match args.first() {
        Some(format) => format.parse::<LogFormat>()?,
        None => LogFormat::default(),
    };

    let mut logging = LoggingConfig::default().with_format(format);
    let mut log_file = None;
    if let Some(filter) = args.get(1) {
        logging = logging.with_filter(filter.clone());
    }
    if let Ok(path) = env::var("CONTINUATION_LAB_LOG_FILE") {
        let sink = core_async::block_on(JsonLinesLoggerSink::open(&path, LogLevel::Debug))
            .with_context(|| format!("Failed to open log file {}", path))?;
        log_file = Some(sink.path().display().to_string());
        logging = logging.with_logger_sink(Arc::new(sink));
    }
    init_logging(logging)?;
    if let Some(path) = log_file {
        info!(path = %path, "Mirroring log events to file");
    }

    let style = match env::var("CONTINUATION_LAB_DIAGNOSTICS") {
        Ok(style) => style.parse::<OutputStyle>()?,
        Err(_) => OutputStyle::Text,
    };

    let mut builder = SchedulingConfig::builder();
    if let Ok(workers) = env::var("CONTINUATION_LAB_POOL_WORKERS") {
        let workers = workers
            .parse::<usize>()
            .with_context(|| format!("Invalid CONTINUATION_LAB_POOL_WORKERS: {}", workers))?;
        builder = builder.pool_workers(workers);
    }
    let config = builder.build()?;

    let bus = Arc::new(EventBus::default());
    let printer = spawn_printer(&bus, ConsoleDiagnosticSink::new(style))?;

    let env = ExecutionEnvironment::start(&config, bus.clone())?;
    let runner = ScenarioRunner::new(env.clone());
    let mut presenter = ConsolePresenter::new();
    runner.register_all(&mut presenter);

    match env::var("CONTINUATION_LAB_SCENARIOS") {
        Ok(selection) => {
            for label in selection.split(',').map(str::trim).filter(|l| !l.is_empty()) {
                let scenario: Scenario = label.parse()?;
                presenter.trigger(scenario.label())?;
            }
        }
        Err(_) => presenter.trigger_all(),
    }

    let reports = runner.wait_settled(SETTLE_TIMEOUT)?;
    env.shutdown();

    let mut failed = 0;
    for report in &reports {
        match &report.outcome {
            Ok(summary) => info!(scenario = %report.scenario, "{}", summary),
            Err(e) => {
                failed += 1;
                error!(scenario = %report.scenario, error = %e, "Scenario failed");
            }
        }
    }

    drop(presenter);
    drop(runner);
    drop(env);
    drop(bus);
    join_printer(printer);

    if failed > 0 {
        bail!("{} of {} scenarios failed", failed, reports.len());
    }
    Ok(())
}

/// Forwards bus events to `console` until every bus handle is gone.
fn spawn_printer(bus: &EventBus, console: ConsoleDiagnosticSink) -> Result<JoinHandle<()>> {
    let mut events = bus.subscribe();

    thread::Builder::new()
        .name("diagnostics-printer".to_string())
        .spawn(move || loop {
            match events.blocking_recv() {
                Ok(DiagnosticEvent::Observation(record)) => console.record(record),
                Ok(DiagnosticEvent::UnobservedError(report)) => console.unobserved_error(report),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Diagnostics printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        })
        .context("Failed to spawn diagnostics printer")
}

fn join_printer(printer: JoinHandle<()>) {
    // Bounded wait: a sink clone kept alive elsewhere would block `join` forever.
    let deadline = Instant::now() + PRINTER_JOIN_TIMEOUT;
    while !printer.is_finished() {
        if Instant::now() >= deadline {
            warn!("Diagnostics printer still waiting for events, exiting anyway");
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    if printer.join().is_err() {
        error!("Diagnostics printer panicked");
    }
}

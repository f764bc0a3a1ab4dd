//! Console diagnostic sink.

use bridge_traits::diagnostics::{DiagnosticRecord, DiagnosticSink, UnobservedError};
use bridge_traits::error::BridgeError;
use serde::Serialize;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::warn;

/// How records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    /// One human-readable line per record
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for OutputStyle {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputStyle::Text),
            "json" => Ok(OutputStyle::Json),
            _ => Err(BridgeError::InvalidOutputStyle(s.to_string())),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", content = "payload")]
enum Line<'a> {
    Observation(&'a DiagnosticRecord),
    UnobservedError(&'a UnobservedError),
}

/// Writes records to stdout.
///
/// Records from different threads are written whole; their relative order is
/// whatever order the threads reached the sink in.
#[derive(Debug, Default)]
pub struct ConsoleDiagnosticSink {
    style: OutputStyle,
    lock: Mutex<()>,
}

impl ConsoleDiagnosticSink {
    pub fn new(style: OutputStyle) -> Self {
        Self {
            style,
            lock: Mutex::new(()),
        }
    }

    pub fn style(&self) -> OutputStyle {
        self.style
    }

    fn render(&self, line: Line<'_>) -> String {
        match self.style {
            OutputStyle::Text => match line {
                Line::Observation(record) => record.to_string(),
                Line::UnobservedError(report) => format!("!! {}", report),
            },
            OutputStyle::Json => serde_json::to_string(&line).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to serialize diagnostic line");
                String::new()
            }),
        }
    }

    fn write(&self, rendered: String) {
        if rendered.is_empty() {
            return;
        }
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", rendered) {
            warn!(error = %e, "Failed to write diagnostic line");
        }
    }
}

impl DiagnosticSink for ConsoleDiagnosticSink {
    fn record(&self, record: DiagnosticRecord) {
        self.write(self.render(Line::Observation(&record)));
    }

    fn unobserved_error(&self, report: UnobservedError) {
        warn!(
            scenario = report.scenario.as_deref().unwrap_or_default(),
            kind = %report.error_kind,
            "Unobserved failure: {}",
            report.message
        );
        self.write(self.render(Line::UnobservedError(&report)));
    }
}

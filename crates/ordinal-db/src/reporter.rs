use std::sync::Mutex;

use tracing::{error, info};

/// Receives progress and failure messages from a migration run.
pub trait Reporter {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Routes messages to `tracing` at INFO and ERROR.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&self, message: &str) {
        info!(target: "ordinal", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "ordinal", "{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub severity: Severity,
    pub message: String,
}

/// Keeps every message in memory, for tests and embedders that want to
/// inspect a run afterwards.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter(|r| r.severity == severity)
            .map(|r| r.message)
            .collect()
    }

    fn push(&self, severity: Severity, message: &str) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(Report {
                severity,
                message: message.to_string(),
            });
        }
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.push(Severity::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(Severity::Error, message);
    }
}

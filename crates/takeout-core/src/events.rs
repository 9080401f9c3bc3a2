//! Events streamed from a run to whatever presents it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag attached to every log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Process,
    Success,
    Warn,
    Error,
    Fatal,
    Action,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Process => "PROCESS",
            Severity::Success => "SUCCESS",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
            Severity::Action => "ACTION",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

/// Counters reported once a run ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub total: u64,
    pub processed: u64,
    /// Files skipped because the run was cancelled before they started
    pub skipped: u64,
    pub matched: u64,
    pub unmatched: u64,
    /// Files whose metadata was written and mtime restored
    pub applied: u64,
    /// Soft failures: unusable sidecar metadata
    pub warnings: u64,
    /// Per-file errors: copy failures and tool failures
    pub errors: u64,
}

impl RunSummary {
    pub fn empty(status: RunStatus) -> Self {
        Self {
            status,
            total: 0,
            processed: 0,
            skipped: 0,
            matched: 0,
            unmatched: 0,
            applied: 0,
            warnings: 0,
            errors: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Log { severity: Severity, message: String },
    Progress {
        processed: u64,
        total: u64,
        file_name: String,
    },
    Finished(RunSummary),
}

impl Event {
    pub fn log(severity: Severity, message: impl Into<String>) -> Self {
        Event::Log {
            severity,
            message: message.into(),
        }
    }
}

/// Sink the pipeline pushes events into. Called from worker threads.
pub type EventCallback<'a> = dyn Fn(Event) + Send + Sync + 'a;

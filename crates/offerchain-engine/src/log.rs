//! Per-packet reconciliation log.
//!
//! Non-fatal anomalies (unsigned counters, unresolved deadlines, label
//! overrides) are recorded here and returned with the result. Each entry is
//! also emitted through `tracing`.

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    Priority,
    Counters,
    Merge,
    Timeline,
    Review,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Priority => "priority",
            Self::Counters => "counters",
            Self::Merge => "merge",
            Self::Timeline => "timeline",
            Self::Review => "review",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub stage: Stage,
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReconcileLog {
    entries: Vec<LogEntry>,
}

impl ReconcileLog {
    pub fn info(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        info!(stage = stage.as_str(), "{message}");
        self.push(stage, Level::Info, message);
    }

    pub fn warn(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        warn!(stage = stage.as_str(), "{message}");
        self.push(stage, Level::Warn, message);
    }

    fn push(&mut self, stage: Stage, level: Level, message: String) {
        self.entries.push(LogEntry {
            stage,
            level,
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.level == Level::Warn)
    }
}

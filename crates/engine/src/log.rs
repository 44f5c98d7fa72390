//! The per-run execution log.
//!
//! Entries are appended in order and never edited.  Each append is also
//! emitted as a `tracing` event so the log shows up in process output.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use nodes::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One structured log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub execution_id: Uuid,
    /// Extra fields (`nodeId`, `duration`, ...), flattened when serialized.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl LogEntry {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Append-only, single-writer log of one run.
#[derive(Debug, Clone)]
pub struct ExecutionLog {
    execution_id: Uuid,
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    pub fn new(execution_id: Uuid) -> Self {
        Self {
            execution_id,
            entries: Vec::new(),
        }
    }

    /// Append an entry and return a reference to it.
    pub fn push<I, K>(&mut self, level: LogLevel, message: impl Into<String>, fields: I) -> &LogEntry
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            execution_id: self.execution_id,
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        };

        let execution_id = entry.execution_id;
        match level {
            LogLevel::Info | LogLevel::Success => {
                info!(%execution_id, level = %level, "{}", entry.message)
            }
            LogLevel::Warning => warn!(%execution_id, "{}", entry.message),
            LogLevel::Error => error!(%execution_id, "{}", entry.message),
        }

        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn info(&mut self, message: impl Into<String>) -> &LogEntry {
        self.push(LogLevel::Info, message, Vec::<(String, Value)>::new())
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

//! Fire-and-forget notifications for whoever displays a run.
//!
//! The editor highlights nodes as they execute; a headless embedding
//! supplies [`NoopObserver`].  Observers must not block: they are called
//! inline on the run's task.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::log::LogEntry;

/// Visual state of one node during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Executing,
    Success,
    Error,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Executing => "executing",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

pub trait ExecutionObserver: Send + Sync {
    fn on_node_state_change(&self, node_id: &str, state: NodeState);

    /// Called after every log append.
    fn on_log(&self, _entry: &LogEntry) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {
    fn on_node_state_change(&self, _node_id: &str, _state: NodeState) {}
}

/// Reports state changes as `tracing` debug events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn on_node_state_change(&self, node_id: &str, state: NodeState) {
        debug!(node_id, %state, "node state changed");
    }
}

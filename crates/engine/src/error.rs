//! Engine-level error types.

use thiserror::Error;

use nodes::NodeError;

/// Errors produced by the workflow engine (graph editing, scheduling,
/// execution).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    // ------ Run preconditions ------

    /// The graph has no nodes; nothing was executed.
    #[error("no nodes to execute")]
    EmptyGraph,

    /// A run is already in progress on this executor.
    #[error("workflow is already executing")]
    AlreadyExecuting,

    // ------ Validation errors ------

    /// Topological sort could not order every node.
    #[error("workflow contains cycles - cannot execute")]
    CyclicGraph,

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// A connection references a node ID that doesn't exist in the workflow.
    #[error("connection references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    // ------ Graph editing errors ------

    #[error("connection '{0}' already exists")]
    DuplicateConnection(String),

    #[error("node '{0}' cannot be connected to itself")]
    SelfLoop(String),

    #[error("unknown connection '{0}'")]
    UnknownConnection(String),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    // ------ Execution errors ------

    /// A node's output was written twice within one run.
    #[error("output for node '{0}' was already recorded in this run")]
    OutputAlreadyRecorded(String),

    /// A node's handler failed; the whole run is aborted.
    #[error("node {node_id} ({node_type}) failed: {source}")]
    NodeExecution {
        node_id: String,
        node_type: String,
        #[source]
        source: NodeError,
    },

    /// The run's cancellation token fired between two nodes.
    #[error("workflow execution cancelled")]
    Cancelled,
}

impl EngineError {
    /// Id of the failing node, for node-level failures.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeExecution { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

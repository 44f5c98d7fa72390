//! The `NodeHandler` trait: the contract every node type must fulfil.

use async_trait::async_trait;
use uuid::Uuid;

use crate::value::{Properties, Value};
use crate::NodeError;

/// Per-run identifiers handed to every handler.
///
/// Defined here (in the nodes crate) so both the engine and individual
/// handlers can import it without a circular dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerContext {
    /// ID of the workflow being run.
    pub workflow_id: Uuid,
    /// ID of the current execution run.
    pub execution_id: Uuid,
}

/// Outputs of a node's direct predecessors, keyed by predecessor id.
///
/// Entries keep connection discovery order, so [`NodeInputs::first`] is
/// the node the `prev.` shortcut refers to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInputs {
    entries: Vec<(String, Value)>,
}

impl NodeInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predecessor's output.  A repeated id keeps its first value.
    pub fn insert(&mut self, node_id: impl Into<String>, output: Value) {
        let node_id = node_id.into();
        if self.get(&node_id).is_none() {
            self.entries.push((node_id, output));
        }
    }

    pub fn get(&self, node_id: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, v)| v)
    }

    /// The first predecessor that produced output.
    pub fn first(&self) -> Option<(&str, &Value)> {
        self.entries.first().map(|(id, v)| (id.as_str(), v))
    }

    /// Output of the first predecessor, or an empty map when there is none.
    pub fn first_or_empty(&self) -> Value {
        self.first()
            .map(|(_, v)| v.clone())
            .unwrap_or_else(Value::empty_map)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(id, v)| (id.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All inputs as a single map value.
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.entries
                .iter()
                .map(|(id, v)| (id.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Everything a handler sees for one node execution.
#[derive(Debug, Clone, Copy)]
pub struct NodeRequest<'a> {
    pub node_id: &'a str,
    pub node_type: &'a str,
    /// Configuration with every `{{...}}` placeholder already resolved.
    pub properties: &'a Properties,
    pub inputs: &'a NodeInputs,
    pub ctx: HandlerContext,
}

impl<'a> NodeRequest<'a> {
    /// String property that is present and non-empty.
    pub fn non_empty_str(&self, key: &str) -> Option<&'a str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// A property, cloned, or `default` when absent.
    pub fn prop_or(&self, key: &str, default: Value) -> Value {
        self.properties.get(key).cloned().unwrap_or(default)
    }
}

/// The core handler trait.
///
/// Handlers are functions of `(resolved node, inputs)`; the built-ins
/// simulate their integration, a production handler may perform real I/O
/// and must translate I/O failures into [`NodeError`].
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError>;
}

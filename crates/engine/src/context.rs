//! Per-run execution context: node id → node output.

use std::collections::BTreeMap;

use nodes::{NodeInputs, Value};

use crate::models::Workflow;
use crate::EngineError;

/// Outputs produced so far in one run.
///
/// Write-once per node id: a second write for the same node is rejected,
/// so nothing a downstream node has read can change under it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    outputs: BTreeMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `node_id`'s output.
    ///
    /// # Errors
    /// [`EngineError::OutputAlreadyRecorded`] if the node already has one.
    pub fn record(&mut self, node_id: &str, output: Value) -> Result<(), EngineError> {
        if self.outputs.contains_key(node_id) {
            return Err(EngineError::OutputAlreadyRecorded(node_id.to_owned()));
        }
        self.outputs.insert(node_id.to_owned(), output);
        Ok(())
    }

    pub fn get(&self, node_id: &str) -> Option<&Value> {
        self.outputs.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.outputs.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn clear(&mut self) {
        self.outputs.clear();
    }

    /// Outputs of `node_id`'s direct predecessors, in connection order.
    ///
    /// Predecessors without a recorded output are skipped.
    pub fn inputs_for(&self, workflow: &Workflow, node_id: &str) -> NodeInputs {
        let mut inputs = NodeInputs::new();
        for pred in workflow.predecessors(node_id) {
            if let Some(output) = self.outputs.get(pred) {
                inputs.insert(pred, output.clone());
            }
        }
        inputs
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.outputs.clone()
    }
}

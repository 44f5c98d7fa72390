//! Fallback handler for node types without a dedicated implementation.

use async_trait::async_trait;

use super::timestamp;
use crate::traits::{NodeHandler, NodeRequest};
use crate::value::Value;
use crate::NodeError;

/// Echoes its inputs and marks itself executed.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericHandler;

#[async_trait]
impl NodeHandler for GenericHandler {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError> {
        Ok(Value::Map(
            [
                ("nodeType".to_owned(), Value::from(request.node_type)),
                ("executed".to_owned(), Value::Bool(true)),
                ("inputs".to_owned(), request.inputs.to_value()),
                ("timestamp".to_owned(), Value::from(timestamp())),
            ]
            .into_iter()
            .collect(),
        ))
    }
}

//! Data-shaping nodes: `filter` and `transform`.

use async_trait::async_trait;

use super::timestamp;
use crate::traits::{NodeHandler, NodeRequest};
use crate::value::Value;
use crate::NodeError;

/// `filter`: evaluates nothing yet; every item passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterHandler;

#[async_trait]
impl NodeHandler for FilterHandler {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError> {
        let conditions = request.prop_or("conditions", Value::List(Vec::new()));
        if conditions.as_list().is_none() {
            return Err(NodeError::InvalidInput(
                "filter `conditions` must be a list".into(),
            ));
        }

        let operator = request.non_empty_str("operator").unwrap_or("AND");

        Ok(Value::Map(
            [
                ("filtered".to_owned(), Value::Bool(true)),
                ("input".to_owned(), request.inputs.first_or_empty()),
                ("conditions".to_owned(), conditions),
                ("operator".to_owned(), Value::from(operator)),
            ]
            .into_iter()
            .collect(),
        ))
    }
}

/// `transform`: stamps the first input and echoes the configured mappings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransformHandler;

#[async_trait]
impl NodeHandler for TransformHandler {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError> {
        let mappings = request.prop_or("mappings", Value::empty_map());
        if mappings.as_map().is_none() {
            return Err(NodeError::InvalidInput(
                "transform `mappings` must be a map".into(),
            ));
        }

        let first = request.inputs.first_or_empty();
        // Only map inputs contribute fields; anything else starts empty.
        let mut output = first.as_map().cloned().unwrap_or_default();
        output.insert("transformed_at".into(), Value::from(timestamp()));
        output.insert("node_type".into(), Value::from(request.node_type));

        Ok(Value::Map(
            [
                ("transformed".to_owned(), Value::Bool(true)),
                ("input".to_owned(), first),
                ("output".to_owned(), Value::Map(output)),
                ("mappings".to_owned(), mappings),
            ]
            .into_iter()
            .collect(),
        ))
    }
}

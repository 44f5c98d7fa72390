//! `api-call`: a simulated outbound HTTP request.

use async_trait::async_trait;
use serde_json::json;

use super::timestamp;
use crate::traits::{NodeHandler, NodeRequest};
use crate::value::Value;
use crate::NodeError;

#[derive(Debug, Default, Clone, Copy)]
pub struct ApiCallHandler;

#[async_trait]
impl NodeHandler for ApiCallHandler {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError> {
        let method = match request.properties.get("method") {
            None => "POST",
            Some(Value::String(m)) if !m.is_empty() => m.as_str(),
            Some(Value::String(_)) => "POST",
            Some(other) => {
                return Err(NodeError::InvalidInput(format!(
                    "api-call `method` must be a string, got {}",
                    other.to_json_string()
                )))
            }
        };
        let first = serde_json::Value::from(request.inputs.first_or_empty());

        Ok(Value::from(json!({
            "status": 200,
            "method": method,
            "url": request.non_empty_str("url").unwrap_or("https://api.example.com"),
            "response": {
                "success": true,
                "data": first,
            },
            "timestamp": timestamp(),
        })))
    }
}

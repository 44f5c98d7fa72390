//! Entry-point nodes: they produce data rather than consume it.

use async_trait::async_trait;
use serde_json::json;

use super::timestamp;
use crate::traits::{NodeHandler, NodeRequest};
use crate::value::Value;
use crate::NodeError;

/// `webhook`: emits a sample inbound HTTP request.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebhookHandler;

#[async_trait]
impl NodeHandler for WebhookHandler {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError> {
        Ok(Value::from(json!({
            "status": 200,
            "method": request.non_empty_str("method").unwrap_or("POST"),
            "url": request.non_empty_str("url").unwrap_or("/webhook"),
            "body": {
                "timestamp": timestamp(),
                "data": "Sample webhook data",
                "source": "webhook-trigger",
            },
            "headers": { "Content-Type": "application/json" },
        })))
    }
}

/// `form`: emits a sample form submission.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormHandler;

#[async_trait]
impl NodeHandler for FormHandler {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError> {
        Ok(Value::from(json!({
            "formName": request.non_empty_str("formName").unwrap_or("Contact Form"),
            "fields": {
                "name": "Jane Doe",
                "email": "jane@example.com",
                "company": "Acme Corp",
                "phone": "+1234567890",
                "message": "Interested in your services",
            },
            "submittedAt": timestamp(),
        })))
    }
}

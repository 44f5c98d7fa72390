//! Outbound messaging: `email-send` and `slack`.

use async_trait::async_trait;
use serde_json::json;

use super::timestamp;
use crate::traits::{NodeHandler, NodeRequest};
use crate::value::Value;
use crate::NodeError;

/// `email-send`: reports the message it would have sent.
///
/// The recipient comes from the `to` property, else the first input's
/// `email` field, else a placeholder address.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmailSendHandler;

#[async_trait]
impl NodeHandler for EmailSendHandler {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError> {
        let first = request.inputs.first_or_empty();
        let to = request
            .non_empty_str("to")
            .or_else(|| first.get("email").and_then(Value::as_str).filter(|s| !s.is_empty()))
            .unwrap_or("recipient@example.com");

        Ok(Value::from(json!({
            "sent": true,
            "provider": request.non_empty_str("provider").unwrap_or("SMTP"),
            "to": to,
            "subject": request.non_empty_str("subject").unwrap_or("Workflow notification"),
            "body": request.non_empty_str("body").unwrap_or("Email body content"),
            "variables_resolved": true,
            "timestamp": timestamp(),
        })))
    }
}

/// `slack`: reports the channel message it would have posted.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlackHandler;

#[async_trait]
impl NodeHandler for SlackHandler {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError> {
        let message = match request.non_empty_str("message") {
            Some(m) => m.to_owned(),
            None => request.inputs.first_or_empty().to_pretty_json(),
        };

        Ok(Value::from(json!({
            "sent": true,
            "channel": request.non_empty_str("channel").unwrap_or("#general"),
            "message": message,
            "variables_resolved": true,
            "timestamp": timestamp(),
        })))
    }
}

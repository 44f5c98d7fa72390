//! Simulated LLM calls (`chatgpt`, `gemini`).

use async_trait::async_trait;
use serde_json::json;

use super::timestamp;
use crate::traits::{NodeHandler, NodeRequest};
use crate::value::Value;
use crate::NodeError;

/// Characters of the prompt quoted back in the simulated response.
const PROMPT_PREVIEW_CHARS: usize = 50;

/// Produces a canned completion that quotes the (already resolved) prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct AiHandler;

#[async_trait]
impl NodeHandler for AiHandler {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError> {
        let prompt = request.non_empty_str("systemPrompt").unwrap_or("Process this data");
        let preview: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
        let first = serde_json::Value::from(request.inputs.first_or_empty());

        Ok(Value::from(json!({
            "model": request.non_empty_str("model").unwrap_or("gpt-4"),
            "prompt": prompt,
            "input": first,
            "response": {
                "text": format!(
                    "Processed by {}: AI response based on prompt \"{preview}...\" and input data.",
                    request.node_type
                ),
                "confidence": 0.95,
                "tokens": 150,
                "variables_resolved": true,
            },
            "timestamp": timestamp(),
        })))
    }
}

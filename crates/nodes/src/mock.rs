//! `MockNode`: a test double for `NodeHandler`.
//!
//! Useful in unit and integration tests where a real handler is either
//! unavailable or irrelevant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::traits::{NodeHandler, NodeRequest};
use crate::value::{Properties, Value};
use crate::NodeError;

/// Behaviour injected into `MockNode` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Return a specific value.
    ReturnValue(Value),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Retryable` error this many times, then return the value.
    FlakyThenReturn(u32, Value),
    /// Fail with a `Fatal` error.
    FailFatal(String),
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub node_id: String,
    /// Resolved properties the handler received.
    pub properties: Properties,
    /// Predecessor ids in the order they were supplied.
    pub input_keys: Vec<String>,
    /// All inputs as a map value.
    pub inputs: Value,
}

/// A mock handler that records every call it receives and returns a
/// programmer-specified result.
#[derive(Debug, Clone)]
pub struct MockNode {
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// Sleep before answering, to hold a run open.
    pub delay: Duration,
    /// All calls seen by this handler (in call order).
    pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockNode {
    fn with_behaviour(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(value: impl Into<Value>) -> Self {
        Self::with_behaviour(MockBehaviour::ReturnValue(value.into()))
    }

    /// Create a mock that always fails with a `Fatal` error.
    pub fn failing_fatal(msg: impl Into<String>) -> Self {
        Self::with_behaviour(MockBehaviour::FailFatal(msg.into()))
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(msg: impl Into<String>) -> Self {
        Self::with_behaviour(MockBehaviour::FailRetryable(msg.into()))
    }

    /// Create a mock that fails `failures` times before succeeding.
    pub fn flaky(failures: u32, value: impl Into<Value>) -> Self {
        Self::with_behaviour(MockBehaviour::FlakyThenReturn(failures, value.into()))
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of times this handler has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Snapshot of the recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeHandler for MockNode {
    async fn execute(&self, request: NodeRequest<'_>) -> Result<Value, NodeError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(MockCall {
                node_id: request.node_id.to_owned(),
                properties: request.properties.clone(),
                input_keys: request.inputs.keys().map(str::to_owned).collect(),
                inputs: request.inputs.to_value(),
            });
            calls.len() as u32
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::FailRetryable(msg) => Err(NodeError::Retryable(msg.clone())),
            MockBehaviour::FlakyThenReturn(failures, v) => {
                if attempt <= *failures {
                    Err(NodeError::Retryable(format!("transient failure #{attempt}")))
                } else {
                    Ok(v.clone())
                }
            }
            MockBehaviour::FailFatal(msg) => Err(NodeError::Fatal(msg.clone())),
        }
    }
}

//! Per-node execution: inputs, variable resolution, dispatch, capture.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use nodes::{HandlerContext, NodeError, NodeHandler, NodeRegistry, NodeRequest, Value};

use crate::context::ExecutionContext;
use crate::executor::ExecutorConfig;
use crate::log::{ExecutionLog, LogEntry, LogLevel};
use crate::models::{Node, Workflow};
use crate::observer::{ExecutionObserver, NodeState};
use crate::template::VariableResolver;
use crate::EngineError;

/// Upper bound on a single back-off sleep.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Mutable state of one run, owned by the coordinator and lent to the
/// node executor one node at a time.
pub(crate) struct RunState<'w> {
    pub(crate) workflow: &'w Workflow,
    pub(crate) handler_ctx: HandlerContext,
    pub(crate) context: ExecutionContext,
    pub(crate) log: ExecutionLog,
    observer: Arc<dyn ExecutionObserver>,
}

impl<'w> RunState<'w> {
    pub(crate) fn new(
        workflow: &'w Workflow,
        handler_ctx: HandlerContext,
        observer: Arc<dyn ExecutionObserver>,
    ) -> Self {
        Self {
            workflow,
            handler_ctx,
            context: ExecutionContext::new(),
            log: ExecutionLog::new(handler_ctx.execution_id),
            observer,
        }
    }

    /// Append to the log and notify the observer.
    pub(crate) fn log<I, K>(&mut self, level: LogLevel, message: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entry: &LogEntry = self.log.push(level, message, fields);
        self.observer.on_log(entry);
    }

    fn signal(&self, node_id: &str, state: NodeState) {
        self.observer.on_node_state_change(node_id, state);
    }

    pub(crate) fn into_parts(self) -> (ExecutionContext, ExecutionLog) {
        (self.context, self.log)
    }
}

/// Runs single nodes against a [`RunState`].
#[derive(Clone)]
pub(crate) struct NodeExecutor {
    registry: Arc<NodeRegistry>,
    config: ExecutorConfig,
}

impl NodeExecutor {
    pub(crate) fn new(registry: Arc<NodeRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    /// Execute `node` and record its output in the run's context.
    ///
    /// # Errors
    /// [`EngineError::NodeExecution`] if the handler fails (after any
    /// configured retries).  The failure is logged and signalled before it
    /// is returned.
    pub(crate) async fn execute_node(&self, node: &Node, run: &mut RunState<'_>) -> Result<Value, EngineError> {
        let started = Instant::now();
        run.log(
            LogLevel::Info,
            format!("Executing node: {}", node.node_type),
            [("nodeId", Value::from(node.id.as_str()))],
        );
        run.signal(&node.id, NodeState::Executing);

        match self.run_node(node, run).await {
            Ok(output) => {
                run.signal(&node.id, NodeState::Success);
                let output_size = output.to_json_string().len() as i64;
                run.log(
                    LogLevel::Success,
                    format!("Node executed successfully: {}", node.node_type),
                    [
                        ("nodeId", Value::from(node.id.as_str())),
                        ("duration", Value::from(started.elapsed().as_millis() as i64)),
                        ("outputSize", Value::from(output_size)),
                    ],
                );
                Ok(output)
            }
            Err(err) => {
                run.signal(&node.id, NodeState::Error);
                let err = match err {
                    NodeFailure::Handler(source) => EngineError::NodeExecution {
                        node_id: node.id.clone(),
                        node_type: node.node_type.clone(),
                        source,
                    },
                    NodeFailure::Engine(e) => e,
                };
                run.log(
                    LogLevel::Error,
                    format!("Node execution failed: {}", node.node_type),
                    [
                        ("nodeId", Value::from(node.id.as_str())),
                        ("error", Value::from(err.to_string())),
                    ],
                );
                Err(err)
            }
        }
    }

    async fn run_node(&self, node: &Node, run: &mut RunState<'_>) -> Result<Value, NodeFailure> {
        let inputs = run.context.inputs_for(run.workflow, &node.id);

        let resolution = VariableResolver::new(&run.context, &inputs).resolve_properties(&node.properties);
        for miss in &resolution.unresolved {
            run.log(
                LogLevel::Warning,
                miss.to_string(),
                [
                    ("nodeId", Value::from(node.id.as_str())),
                    ("placeholder", Value::from(miss.placeholder.as_str())),
                ],
            );
        }

        if !self.config.simulated_latency.is_zero() {
            tokio::time::sleep(self.config.simulated_latency).await;
        }

        let handler = self.registry.handler(&node.node_type);
        let request = NodeRequest {
            node_id: &node.id,
            node_type: &node.node_type,
            properties: &resolution.properties,
            inputs: &inputs,
            ctx: run.handler_ctx,
        };
        let output = self
            .execute_with_retry(handler.as_ref(), request)
            .await
            .map_err(NodeFailure::Handler)?;

        run.context
            .record(&node.id, output.clone())
            .map_err(NodeFailure::Engine)?;
        Ok(output)
    }

    // -----------------------------------------------------------------------
    // Internal: call a handler with retry logic.
    // -----------------------------------------------------------------------

    async fn execute_with_retry(
        &self,
        handler: &dyn NodeHandler,
        request: NodeRequest<'_>,
    ) -> Result<Value, NodeError> {
        let mut attempts = 0u32;

        loop {
            match handler.execute(request).await {
                Ok(output) => return Ok(output),

                Err(NodeError::Retryable(msg)) if attempts < self.config.max_retries => {
                    attempts += 1;
                    let delay = backoff(self.config.retry_base_delay, attempts);

                    warn!(
                        "node '{}' retryable error (attempt {}/{}), retrying in {:?}: {}",
                        request.node_id, attempts, self.config.max_retries, delay, msg
                    );

                    tokio::time::sleep(delay).await;
                }

                Err(err) => {
                    debug!(node_id = request.node_id, attempts, "handler gave up: {err}");
                    return Err(err);
                }
            }
        }
    }
}

enum NodeFailure {
    Handler(NodeError),
    Engine(EngineError),
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`,
/// saturating at [`MAX_RETRY_DELAY`].
fn backoff(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

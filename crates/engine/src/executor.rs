//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Refuses to start while another run is in progress on the same executor.
//! 2. Validates the graph and produces a topological ordering.
//! 3. Runs nodes one at a time in that order via the node executor, each node
//!    seeing the outputs of everything that ran before it.
//! 4. Stops at the first failing node and propagates its error.
//! 5. Keeps the last run's context and log for inspection.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use nodes::{HandlerContext, NodeRegistry, Value};

use crate::context::ExecutionContext;
use crate::dag::validate_dag;
use crate::log::{LogEntry, LogLevel};
use crate::node_executor::{NodeExecutor, RunState};
use crate::observer::{ExecutionObserver, NoopObserver};
use crate::{EngineError, Workflow};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of times a retryable node failure will be retried.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub retry_base_delay: Duration,
    /// Artificial pause before each handler call, for demos.
    pub simulated_latency: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_base_delay: Duration::from_millis(100),
            simulated_latency: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Output of a completed execution
// ---------------------------------------------------------------------------

/// The result of running a full workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub execution_id: Uuid,
    /// Every node's output, keyed by node id.
    pub context: BTreeMap<String, Value>,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Default)]
struct LastRun {
    context: ExecutionContext,
    logs: Vec<LogEntry>,
}

/// Holds the executing flag for the lifetime of one run.
struct ExecutingGuard<'a>(&'a AtomicBool);

impl<'a> ExecutingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, EngineError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EngineError::AlreadyExecuting)?;
        Ok(Self(flag))
    }
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Orchestrator that runs workflows one at a time.
///
/// Construct one executor per editor session and call
/// [`WorkflowExecutor::execute_workflow`] with the graph to run.  A second
/// call made while a run is in flight fails with
/// [`EngineError::AlreadyExecuting`] without disturbing the first.
pub struct WorkflowExecutor {
    registry: Arc<NodeRegistry>,
    config: ExecutorConfig,
    observer: Arc<dyn ExecutionObserver>,
    executing: AtomicBool,
    last_run: Mutex<LastRun>,
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(registry: Arc<NodeRegistry>, config: ExecutorConfig) -> Self {
        Self {
            registry,
            config,
            observer: Arc::new(NoopObserver),
            executing: AtomicBool::new(false),
            last_run: Mutex::new(LastRun::default()),
        }
    }

    /// Attach an observer for node state changes and log appends.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    /// Log of the most recent run (including a failed or cancelled one).
    pub fn logs(&self) -> Vec<LogEntry> {
        self.last_run().logs.clone()
    }

    /// Outputs of the most recent run, partial if it failed.
    pub fn context(&self) -> ExecutionContext {
        self.last_run().context.clone()
    }

    /// Forget the last run's context and log.
    pub fn clear(&self) {
        *self.last_run() = LastRun::default();
    }

    /// Run the workflow to completion.
    ///
    /// # Errors
    /// See [`WorkflowExecutor::execute_workflow_with_cancel`].
    pub async fn execute_workflow(&self, workflow: &Workflow) -> Result<ExecutionResult, EngineError> {
        self.execute_workflow_with_cancel(workflow, CancellationToken::new())
            .await
    }

    /// Run the workflow, checking `cancel` before each node.
    ///
    /// # Errors
    /// - [`EngineError::AlreadyExecuting`] if a run is in progress.
    /// - [`EngineError::EmptyGraph`] if the workflow has no nodes.
    /// - Graph validation errors ([`EngineError::CyclicGraph`] and friends).
    /// - [`EngineError::NodeExecution`] for the first failing node.
    /// - [`EngineError::Cancelled`] if the token fired mid-run.
    #[instrument(skip(self, workflow, cancel), fields(workflow_id = %workflow.id))]
    pub async fn execute_workflow_with_cancel(
        &self,
        workflow: &Workflow,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, EngineError> {
        let _guard = ExecutingGuard::acquire(&self.executing)?;

        if workflow.nodes.is_empty() {
            return Err(EngineError::EmptyGraph);
        }

        let execution_id = Uuid::new_v4();
        self.clear();

        let handler_ctx = HandlerContext {
            workflow_id: workflow.id,
            execution_id,
        };
        let mut run = RunState::new(workflow, handler_ctx, Arc::clone(&self.observer));
        let started = Instant::now();

        run.log(
            LogLevel::Info,
            "Workflow execution started",
            [("workflowId", Value::from(workflow.id.to_string()))],
        );

        let outcome = self.run_nodes(workflow, &cancel, &mut run).await;

        match &outcome {
            Ok(executed) => {
                run.log(
                    LogLevel::Success,
                    "Workflow execution completed successfully",
                    [
                        ("nodesExecuted", Value::from(*executed as i64)),
                        ("duration", Value::from(started.elapsed().as_millis() as i64)),
                    ],
                );
            }
            Err(err) => {
                run.log(
                    LogLevel::Error,
                    format!("Workflow execution failed: {err}"),
                    [("error", Value::from(err.to_string()))],
                );
            }
        }

        let (context, log) = run.into_parts();
        let logs = log.into_entries();
        let result = outcome.map(|_| ExecutionResult {
            success: true,
            execution_id,
            context: context.snapshot(),
            logs: logs.clone(),
        });
        *self.last_run() = LastRun { context, logs };
        result
    }

    /// Schedule and run every node; returns how many ran.
    async fn run_nodes(
        &self,
        workflow: &Workflow,
        cancel: &CancellationToken,
        run: &mut RunState<'_>,
    ) -> Result<usize, EngineError> {
        let order = validate_dag(workflow)?;
        run.log(
            LogLevel::Info,
            format!("Execution order determined: {} nodes", order.len()),
            [(
                "nodeIds",
                Value::List(order.iter().map(|id| Value::from(id.as_str())).collect()),
            )],
        );

        let node_executor = NodeExecutor::new(Arc::clone(&self.registry), self.config.clone());

        for node_id in &order {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let node = workflow
                .node(node_id)
                .ok_or_else(|| EngineError::UnknownNode(node_id.clone()))?;
            node_executor.execute_node(node, run).await?;
        }

        Ok(order.len())
    }

    fn last_run(&self) -> MutexGuard<'_, LastRun> {
        self.last_run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

//! End-to-end tests for the workflow execution engine.
//!
//! Every node type used here is backed by a `MockNode` (or a tiny local
//! handler) registered under its own type tag, so each test can inspect
//! exactly what its handlers received.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use nodes::builtin::TransformHandler;
use nodes::mock::MockNode;
use nodes::registry::Category;
use nodes::value::properties_from_json;
use nodes::{NodeError, NodeHandler, NodeRegistry, NodeRequest, Properties, Value};

use crate::{
    Connection, EngineError, ExecutionObserver, ExecutorConfig, LogLevel, Node, NodeState,
    Workflow, WorkflowExecutor,
};

/// One mock per node; each node's type tag is `mock_<id>`.
fn mocks_registry(mocks: &[(&str, &MockNode)]) -> Arc<NodeRegistry> {
    let builder = mocks.iter().fold(NodeRegistry::builder(), |b, (id, mock)| {
        b.handler(&format!("mock_{id}"), Category::Custom, Arc::new((*mock).clone()))
    });
    Arc::new(builder.build())
}

fn mock_node(id: &str, props: serde_json::Value) -> Node {
    Node::new(id, format!("mock_{id}"), properties_from_json(props))
}

fn plain(id: &str) -> Node {
    mock_node(id, json!({}))
}

fn edges(pairs: &[(&str, &str)]) -> Vec<Connection> {
    pairs.iter().map(|(f, t)| Connection::new(*f, *t)).collect()
}

fn executor(registry: Arc<NodeRegistry>) -> WorkflowExecutor {
    WorkflowExecutor::new(registry, ExecutorConfig::default())
}

fn messages(logs: &[crate::LogEntry]) -> Vec<String> {
    logs.iter().map(|e| e.message.clone()).collect()
}

// ============================================================
// Happy path
// ============================================================

#[tokio::test]
async fn linear_workflow_runs_in_order_and_returns_every_output() {
    let a = MockNode::returning(json!({ "step": "a" }));
    let b = MockNode::returning(json!({ "step": "b" }));
    let c = MockNode::returning(json!({ "step": "c" }));
    let registry = mocks_registry(&[("a", &a), ("b", &b), ("c", &c)]);
    let wf = Workflow::new(
        "linear",
        vec![plain("c"), plain("a"), plain("b")],
        edges(&[("a", "b"), ("b", "c")]),
    );

    let exec = executor(registry);
    let result = exec.execute_workflow(&wf).await.expect("run succeeds");

    assert!(result.success);
    assert_eq!(result.context.len(), 3);
    assert_eq!(result.context["b"], Value::from(json!({ "step": "b" })));
    assert!(result.logs.iter().all(|e| e.execution_id == result.execution_id));

    let executed: Vec<_> = result
        .logs
        .iter()
        .filter(|e| e.message.starts_with("Executing node"))
        .filter_map(|e| e.field("nodeId").and_then(Value::as_str).map(str::to_owned))
        .collect();
    assert_eq!(executed, vec!["a", "b", "c"]);

    let msgs = messages(&result.logs);
    assert_eq!(msgs.first().map(String::as_str), Some("Workflow execution started"));
    assert!(msgs.contains(&"Execution order determined: 3 nodes".to_owned()));
    assert_eq!(
        msgs.last().map(String::as_str),
        Some("Workflow execution completed successfully")
    );
    assert_eq!(
        result.logs.last().and_then(|e| e.field("nodesExecuted")),
        Some(&Value::from(3_i64))
    );

    assert!(!exec.is_executing());
    assert_eq!(exec.logs(), result.logs);
    assert_eq!(exec.context().len(), 3);
}

#[tokio::test]
async fn result_serializes_with_camel_case_keys() {
    let a = MockNode::returning(json!({ "ok": true }));
    let exec = executor(mocks_registry(&[("a", &a)]));
    let wf = Workflow::new("single", vec![plain("a")], vec![]);

    let result = exec.execute_workflow(&wf).await.unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["executionId"], result.execution_id.to_string());
    assert_eq!(json["context"]["a"]["ok"], true);
    assert_eq!(json["logs"][0]["level"], "info");
}

// ============================================================
// Variable resolution through the engine
// ============================================================

#[tokio::test]
async fn prev_and_direct_references_resolve_to_the_same_value() {
    let a = MockNode::returning(json!({ "msg": "hi", "count": 3 }));
    let b = MockNode::returning(json!({}));
    let registry = mocks_registry(&[("a", &a), ("b", &b)]);
    let wf = Workflow::new(
        "refs",
        vec![
            plain("a"),
            mock_node(
                "b",
                json!({
                    "viaPrev": "{{prev.msg}}",
                    "direct": "{{a.msg}} x{{ a.count }}",
                    "nested": { "list": ["{{prev.msg}}", 7] },
                }),
            ),
        ],
        edges(&[("a", "b")]),
    );

    executor(registry).execute_workflow(&wf).await.unwrap();

    let call = &b.calls()[0];
    assert_eq!(call.properties["viaPrev"], Value::from("hi"));
    assert_eq!(call.properties["direct"], Value::from("hi x3"));
    assert_eq!(
        call.properties["nested"],
        Value::from(json!({ "list": ["hi", 7] }))
    );
    assert_eq!(call.input_keys, vec!["a"]);
}

#[tokio::test]
async fn unresolved_placeholder_passes_through_with_a_warning() {
    let a = MockNode::returning(json!({ "msg": "hi" }));
    let b = MockNode::returning(json!({}));
    let registry = mocks_registry(&[("a", &a), ("b", &b)]);
    let wf = Workflow::new(
        "passthrough",
        vec![plain("a"), mock_node("b", json!({ "x": "{{nonexistent.field}}" }))],
        edges(&[("a", "b")]),
    );

    let result = executor(registry).execute_workflow(&wf).await.unwrap();

    assert_eq!(b.calls()[0].properties["x"], Value::from("{{nonexistent.field}}"));
    let warnings: Vec<_> = result
        .logs
        .iter()
        .filter(|e| e.level == LogLevel::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field("nodeId"), Some(&Value::from("b")));
    assert_eq!(
        warnings[0].field("placeholder"),
        Some(&Value::from("{{nonexistent.field}}"))
    );
}

#[tokio::test]
async fn prev_on_a_root_node_is_left_verbatim() {
    let a = MockNode::returning(json!({}));
    let registry = mocks_registry(&[("a", &a)]);
    let wf = Workflow::new("root", vec![mock_node("a", json!({ "x": "{{prev.msg}}" }))], vec![]);

    let result = executor(registry).execute_workflow(&wf).await.unwrap();

    assert_eq!(a.calls()[0].properties["x"], Value::from("{{prev.msg}}"));
    assert!(result.logs.iter().any(|e| e.level == LogLevel::Warning));
}

#[tokio::test]
async fn fan_in_receives_every_predecessor_in_connection_order() {
    let x = MockNode::returning(json!({ "from": "x" }));
    let y = MockNode::returning(json!({ "from": "y" }));
    let z = MockNode::returning(json!({}));
    let registry = mocks_registry(&[("x", &x), ("y", &y), ("z", &z)]);
    let wf = Workflow::new(
        "fan-in",
        vec![plain("x"), plain("y"), mock_node("z", json!({ "first": "{{prev.from}}" }))],
        edges(&[("y", "z"), ("x", "z")]),
    );

    executor(registry).execute_workflow(&wf).await.unwrap();

    let call = &z.calls()[0];
    assert_eq!(call.input_keys, vec!["y", "x"]);
    assert_eq!(call.inputs.get("x"), Some(&Value::from(json!({ "from": "x" }))));
    assert_eq!(call.properties["first"], Value::from("y"));
}

// ============================================================
// Failures
// ============================================================

#[tokio::test]
async fn failing_node_stops_the_run_and_keeps_partial_context() {
    let a = MockNode::returning(json!({ "ok": 1 }));
    let b = MockNode::failing_fatal("boom");
    let c = MockNode::returning(json!({}));
    let registry = mocks_registry(&[("a", &a), ("b", &b), ("c", &c)]);
    let wf = Workflow::new(
        "isolation",
        vec![plain("a"), plain("b"), plain("c")],
        edges(&[("a", "b"), ("b", "c")]),
    );

    let exec = executor(registry);
    let err = exec.execute_workflow(&wf).await.unwrap_err();

    match &err {
        EngineError::NodeExecution { node_id, node_type, source } => {
            assert_eq!(node_id, "b");
            assert_eq!(node_type, "mock_b");
            assert_eq!(source, &NodeError::Fatal("boom".into()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.node_id(), Some("b"));
    assert!(err.to_string().contains("b"));

    assert_eq!(c.call_count(), 0);
    let ctx = exec.context();
    assert!(ctx.contains("a"));
    assert!(!ctx.contains("b"));
    assert!(!ctx.contains("c"));

    let logs = exec.logs();
    let node_error = logs
        .iter()
        .find(|e| e.level == LogLevel::Error && e.message == "Node execution failed: mock_b")
        .expect("node failure logged");
    assert_eq!(node_error.field("nodeId"), Some(&Value::from("b")));
    assert!(logs
        .last()
        .is_some_and(|e| e.message.starts_with("Workflow execution failed")));
    assert!(!exec.is_executing());
}

#[tokio::test]
async fn empty_graph_is_rejected_without_logging() {
    let exec = executor(Arc::new(NodeRegistry::builtin()));
    let wf = Workflow::new("empty", vec![], vec![]);

    assert_eq!(exec.execute_workflow(&wf).await.unwrap_err(), EngineError::EmptyGraph);
    assert!(exec.logs().is_empty());
    assert!(!exec.is_executing());
}

#[tokio::test]
async fn cycle_is_rejected_before_any_handler_runs() {
    let a = MockNode::returning(json!({}));
    let b = MockNode::returning(json!({}));
    let registry = mocks_registry(&[("a", &a), ("b", &b)]);
    let wf = Workflow::new(
        "cycle",
        vec![plain("a"), plain("b")],
        edges(&[("a", "b"), ("b", "a")]),
    );

    let exec = executor(registry);
    assert_eq!(exec.execute_workflow(&wf).await.unwrap_err(), EngineError::CyclicGraph);
    assert_eq!(a.call_count() + b.call_count(), 0);
    assert!(exec
        .logs()
        .iter()
        .any(|e| e.level == LogLevel::Error && e.message.contains("cycles")));
}

#[tokio::test]
async fn duplicate_node_ids_are_rejected() {
    let a = MockNode::returning(json!({}));
    let registry = mocks_registry(&[("a", &a)]);
    let wf = Workflow::new("dup", vec![plain("a"), plain("a")], vec![]);

    assert_eq!(
        executor(registry).execute_workflow(&wf).await.unwrap_err(),
        EngineError::DuplicateNodeId("a".into())
    );
    assert_eq!(a.call_count(), 0);
}

// ============================================================
// Retries
// ============================================================

fn retrying(max_retries: u32) -> ExecutorConfig {
    ExecutorConfig {
        max_retries,
        retry_base_delay: Duration::from_millis(1),
        ..ExecutorConfig::default()
    }
}

#[tokio::test]
async fn retryable_failures_are_retried_up_to_the_limit() {
    let flaky = MockNode::flaky(2, json!({ "ok": true }));
    let exec = WorkflowExecutor::new(mocks_registry(&[("a", &flaky)]), retrying(3));
    let wf = Workflow::new("flaky", vec![plain("a")], vec![]);

    let result = exec.execute_workflow(&wf).await.unwrap();
    assert_eq!(flaky.call_count(), 3);
    assert_eq!(result.context["a"], Value::from(json!({ "ok": true })));
}

#[tokio::test]
async fn retries_are_exhausted_then_the_run_fails() {
    let down = MockNode::failing_retryable("unavailable");
    let exec = WorkflowExecutor::new(mocks_registry(&[("a", &down)]), retrying(1));
    let wf = Workflow::new("down", vec![plain("a")], vec![]);

    let err = exec.execute_workflow(&wf).await.unwrap_err();
    assert_eq!(down.call_count(), 2);
    assert!(matches!(
        err,
        EngineError::NodeExecution { source: NodeError::Retryable(_), .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn large_retry_budget_exhausts_without_overflowing_the_backoff() {
    let down = MockNode::failing_retryable("unavailable");
    let config = ExecutorConfig {
        max_retries: 40,
        retry_base_delay: Duration::from_nanos(1),
        ..ExecutorConfig::default()
    };
    let exec = WorkflowExecutor::new(mocks_registry(&[("a", &down)]), config);
    let wf = Workflow::new("down", vec![plain("a")], vec![]);

    let err = exec.execute_workflow(&wf).await.unwrap_err();
    assert_eq!(down.call_count(), 41);
    assert!(matches!(
        err,
        EngineError::NodeExecution { source: NodeError::Retryable(_), .. }
    ));
}

#[tokio::test]
async fn retryable_failure_is_not_retried_by_default() {
    let down = MockNode::failing_retryable("unavailable");
    let exec = executor(mocks_registry(&[("a", &down)]));
    let wf = Workflow::new("down", vec![plain("a")], vec![]);

    assert!(exec.execute_workflow(&wf).await.is_err());
    assert_eq!(down.call_count(), 1);
}

// ============================================================
// Reentrancy and cancellation
// ============================================================

#[tokio::test]
async fn second_run_while_executing_is_rejected() {
    let slow = MockNode::returning(json!({ "done": true })).delayed(Duration::from_millis(100));
    let exec = executor(mocks_registry(&[("a", &slow)]));
    let wf = Workflow::new("slow", vec![plain("a")], vec![]);

    let (first, second) = tokio::join!(exec.execute_workflow(&wf), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(exec.is_executing());
        exec.execute_workflow(&wf).await
    });

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), EngineError::AlreadyExecuting);
    assert_eq!(slow.call_count(), 1);
    assert!(!exec.is_executing());

    // The flag is released, so a later run goes ahead.
    assert!(exec.execute_workflow(&wf).await.is_ok());
}

#[tokio::test]
async fn cancelled_token_stops_before_the_first_node() {
    let a = MockNode::returning(json!({}));
    let exec = executor(mocks_registry(&[("a", &a)]));
    let wf = Workflow::new("cancel", vec![plain("a")], vec![]);

    let token = CancellationToken::new();
    token.cancel();

    assert_eq!(
        exec.execute_workflow_with_cancel(&wf, token).await.unwrap_err(),
        EngineError::Cancelled
    );
    assert_eq!(a.call_count(), 0);
    assert!(!exec.is_executing());
}

/// Cancels the run's token from inside a handler.
struct CancelsRun(CancellationToken);

#[async_trait]
impl NodeHandler for CancelsRun {
    async fn execute(&self, _request: NodeRequest<'_>) -> Result<Value, NodeError> {
        self.0.cancel();
        Ok(Value::from("cancelled downstream"))
    }
}

#[tokio::test]
async fn cancellation_mid_run_skips_remaining_nodes() {
    let token = CancellationToken::new();
    let b = MockNode::returning(json!({}));
    let registry = NodeRegistry::builder()
        .handler("canceller", Category::Custom, Arc::new(CancelsRun(token.clone())))
        .handler("mock_b", Category::Custom, Arc::new(b.clone()))
        .build();
    let wf = Workflow::new(
        "mid-cancel",
        vec![Node::new("a", "canceller", Properties::new()), plain("b")],
        edges(&[("a", "b")]),
    );

    let exec = executor(Arc::new(registry));
    let err = exec.execute_workflow_with_cancel(&wf, token).await.unwrap_err();

    assert_eq!(err, EngineError::Cancelled);
    assert_eq!(b.call_count(), 0);
    assert!(exec.context().contains("a"));
}

// ============================================================
// Observer
// ============================================================

#[derive(Default)]
struct RecordingObserver {
    states: Mutex<Vec<(String, NodeState)>>,
    log_count: Mutex<usize>,
}

impl ExecutionObserver for RecordingObserver {
    fn on_node_state_change(&self, node_id: &str, state: NodeState) {
        self.states.lock().unwrap().push((node_id.to_owned(), state));
    }

    fn on_log(&self, _entry: &crate::LogEntry) {
        *self.log_count.lock().unwrap() += 1;
    }
}

#[tokio::test]
async fn observer_sees_state_transitions_and_every_log_entry() {
    let a = MockNode::returning(json!({}));
    let b = MockNode::failing_fatal("nope");
    let observer = Arc::new(RecordingObserver::default());
    let exec = executor(mocks_registry(&[("a", &a), ("b", &b)])).with_observer(observer.clone());
    let wf = Workflow::new("observed", vec![plain("a"), plain("b")], edges(&[("a", "b")]));

    let _ = exec.execute_workflow(&wf).await;

    let states = observer.states.lock().unwrap().clone();
    assert_eq!(
        states,
        vec![
            ("a".to_owned(), NodeState::Executing),
            ("a".to_owned(), NodeState::Success),
            ("b".to_owned(), NodeState::Executing),
            ("b".to_owned(), NodeState::Error),
        ]
    );
    assert_eq!(*observer.log_count.lock().unwrap(), exec.logs().len());
}

// ============================================================
// Built-in catalog
// ============================================================

#[tokio::test]
async fn builtin_form_to_email_pipeline_resolves_recipient() {
    let doc = json!({
        "name": "Contact follow-up",
        "nodes": [
            { "id": "form_1", "type": "form", "properties": { "formName": "Contact" } },
            { "id": "mail_1", "type": "email-send", "properties": {
                "to": "{{prev.fields.email}}",
                "subject": "Thanks {{form_1.fields.name}}"
            } },
            { "id": "misc_1", "type": "unheard-of" }
        ],
        "connections": [
            { "from": "form_1", "to": "mail_1" },
            { "from": { "nodeId": "mail_1", "port": "output" }, "to": "misc_1" }
        ]
    });
    let wf = Workflow::from_json(&doc.to_string()).unwrap();

    let exec = executor(Arc::new(NodeRegistry::builtin()));
    let result = exec.execute_workflow(&wf).await.unwrap();

    let mail = &result.context["mail_1"];
    assert_eq!(mail.get("to"), Some(&Value::from("jane@example.com")));
    assert_eq!(mail.get("subject"), Some(&Value::from("Thanks Jane Doe")));

    let misc = &result.context["misc_1"];
    assert_eq!(misc.get("executed"), Some(&Value::Bool(true)));
    assert_eq!(misc.get("nodeType"), Some(&Value::from("unheard-of")));
    assert!(misc
        .get("inputs")
        .and_then(|i| i.get("mail_1"))
        .is_some());
}

#[tokio::test]
async fn transform_after_a_scalar_output_keeps_the_run_going() {
    let text = MockNode::returning("plain text");
    let registry = NodeRegistry::builder()
        .handler("mock_a", Category::Custom, Arc::new(text.clone()))
        .handler("transform", Category::Processing, Arc::new(TransformHandler))
        .build();
    let wf = Workflow::new(
        "scalar-transform",
        vec![plain("a"), Node::new("t", "transform", Properties::new())],
        edges(&[("a", "t")]),
    );

    let result = executor(Arc::new(registry)).execute_workflow(&wf).await.unwrap();

    let out = &result.context["t"];
    assert_eq!(out.get("input"), Some(&Value::from("plain text")));
    assert_eq!(
        out.lookup("output.node_type"),
        Some(&Value::from("transform"))
    );
}

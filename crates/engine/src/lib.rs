//! `engine` crate: graph model, scheduling, variable resolution, and the
//! execution engine.

pub mod context;
pub mod dag;
pub mod error;
pub mod executor;
pub mod log;
pub mod models;
mod node_executor;
pub mod observer;
pub mod template;

pub use context::ExecutionContext;
pub use dag::validate_dag;
pub use error::EngineError;
pub use executor::{ExecutionResult, ExecutorConfig, WorkflowExecutor};
pub use log::{LogEntry, LogLevel};
pub use models::{Connection, Node, Workflow};
pub use observer::{ExecutionObserver, NodeState, NoopObserver, TracingObserver};
pub use template::VariableResolver;

#[cfg(test)]
mod executor_tests;

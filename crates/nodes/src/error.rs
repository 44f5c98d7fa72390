//! Node-level error type.

use thiserror::Error;

/// Errors returned by a handler's `execute` method.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Retryable`   : re-run with exponential back-off while retries remain.
/// - `Fatal`       : the run is aborted immediately.
/// - `InvalidInput`: the node's configuration or inputs are malformed;
///   never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Transient failure; the engine may re-try the node.
    #[error("retryable node error: {0}")]
    Retryable(String),

    /// Permanent failure; no retry should be attempted.
    #[error("fatal node error: {0}")]
    Fatal(String),

    /// Resolved configuration or inputs the handler cannot work with.
    #[error("invalid node input: {0}")]
    InvalidInput(String),
}

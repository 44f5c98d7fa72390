//! `nodes` crate: the `NodeHandler` trait, the node-type registry, and the
//! built-in handler catalog.
//!
//! Every node type, built-in or plugin, is a [`NodeHandler`]
//! registered in a [`NodeRegistry`].  The engine crate dispatches execution
//! through that registry.

pub mod builtin;
pub mod error;
pub mod mock;
pub mod registry;
pub mod traits;
pub mod value;

pub use error::NodeError;
pub use registry::{Category, NodeDescriptor, NodeRegistry};
pub use traits::{HandlerContext, NodeHandler, NodeInputs, NodeRequest};
pub use value::{Properties, Value};

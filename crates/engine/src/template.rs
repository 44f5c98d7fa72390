//! Variable resolution for `{{reference}}` placeholders.
//!
//! Grammar:
//!
//! ```text
//! placeholder := "{{" ws* reference ws* "}}"
//! reference   := "prev." subpath | node_id ("." subpath)?
//! subpath     := key ("." key)*
//! ```
//!
//! Identifiers and keys are drawn from `[A-Za-z0-9_.-]`; the node id is
//! everything before the first dot.  A placeholder that cannot be resolved
//! is left in place verbatim and reported back to the caller, never
//! raised as an error.

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use nodes::{NodeInputs, Properties, Value};

use crate::context::ExecutionContext;

const PREV_PREFIX: &str = "prev.";

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// A parsed placeholder body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `prev.<path>`: the first direct predecessor's output.
    Prev { path: String },
    /// `<node_id>.<path>`: any node already executed in this run.
    Node { node_id: String, path: String },
}

impl Reference {
    pub fn parse(body: &str) -> Self {
        if let Some(path) = body.strip_prefix(PREV_PREFIX) {
            return Reference::Prev { path: path.to_owned() };
        }
        match body.split_once('.') {
            Some((node_id, path)) => Reference::Node {
                node_id: node_id.to_owned(),
                path: path.to_owned(),
            },
            None => Reference::Node {
                node_id: body.to_owned(),
                path: String::new(),
            },
        }
    }
}

/// Why a placeholder was left verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// `prev.` used on a node with no executed predecessor.
    NoPredecessors,
    /// The referenced node has not produced output in this run.
    NodeNotExecuted(String),
    /// The node exists but the path does not lead to a value.
    MissingField { node_id: String, path: String },
}

/// A placeholder that was passed through unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// The full placeholder text, e.g. `{{crm.contact.id}}`.
    pub placeholder: String,
    pub reason: UnresolvedReason,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            UnresolvedReason::NoPredecessors => {
                write!(f, "Variable {}: no previous nodes connected", self.placeholder)
            }
            UnresolvedReason::NodeNotExecuted(node_id) => write!(
                f,
                "Variable {}: node {node_id} not found or not executed yet",
                self.placeholder
            ),
            UnresolvedReason::MissingField { node_id, path } => write!(
                f,
                "Variable {}: node {node_id} has no value at '{path}'",
                self.placeholder
            ),
        }
    }
}

/// Result of resolving one node's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub properties: Properties,
    pub unresolved: Vec<UnresolvedReference>,
}

/// Resolves placeholders against the current run's outputs.
///
/// `inputs` are the outputs of the node's direct predecessors; `prev.`
/// refers to the first of them.
#[derive(Debug, Clone, Copy)]
pub struct VariableResolver<'a> {
    context: &'a ExecutionContext,
    inputs: &'a NodeInputs,
}

impl<'a> VariableResolver<'a> {
    pub fn new(context: &'a ExecutionContext, inputs: &'a NodeInputs) -> Self {
        Self { context, inputs }
    }

    /// Resolve a node's whole configuration tree.
    pub fn resolve_properties(&self, properties: &Properties) -> Resolution {
        let mut unresolved = Vec::new();
        let properties = properties
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve_value(v, &mut unresolved)))
            .collect();
        Resolution {
            properties,
            unresolved,
        }
    }

    /// Strings are scanned, lists and maps are resolved member-wise, every
    /// other value passes through unchanged.
    pub fn resolve_value(&self, value: &Value, unresolved: &mut Vec<UnresolvedReference>) -> Value {
        match value {
            Value::String(s) => Value::String(self.resolve_str(s, unresolved)),
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.resolve_value(item, unresolved))
                    .collect(),
            ),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v, unresolved)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Substitute every placeholder in `text`.
    pub fn resolve_str(&self, text: &str, unresolved: &mut Vec<UnresolvedReference>) -> String {
        if !text.contains("{{") {
            return text.to_owned();
        }
        placeholder_pattern()
            .replace_all(text, |caps: &Captures<'_>| {
                let placeholder = &caps[0];
                match self.lookup(&Reference::parse(&caps[1])) {
                    Ok(value) => value.to_string(),
                    Err(reason) => {
                        unresolved.push(UnresolvedReference {
                            placeholder: placeholder.to_owned(),
                            reason,
                        });
                        placeholder.to_owned()
                    }
                }
            })
            .into_owned()
    }

    fn lookup(&self, reference: &Reference) -> Result<&'a Value, UnresolvedReason> {
        let (node_id, output, path) = match reference {
            Reference::Prev { path } => {
                let (node_id, output) = self.inputs.first().ok_or(UnresolvedReason::NoPredecessors)?;
                (node_id, output, path)
            }
            Reference::Node { node_id, path } => {
                let output = self
                    .context
                    .get(node_id)
                    .ok_or_else(|| UnresolvedReason::NodeNotExecuted(node_id.clone()))?;
                (node_id.as_str(), output, path)
            }
        };
        output.lookup(path).ok_or_else(|| UnresolvedReason::MissingField {
            node_id: node_id.to_owned(),
            path: path.clone(),
        })
    }
}

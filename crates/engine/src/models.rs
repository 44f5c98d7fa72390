//! Core domain models for the workflow engine.
//!
//! The graph itself is owned by the editor; the engine only reads a
//! snapshot of it per run.  These types deserialize the editor's workflow
//! document (camelCase JSON), ignoring editor-only fields such as node
//! positions and canvas settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use nodes::{NodeRegistry, Properties};

use crate::EngineError;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within this workflow (referenced by connections).
    pub id: String,
    /// Selects the handler in the `NodeRegistry`.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Configuration; string values may contain `{{...}}` placeholders.
    #[serde(default)]
    pub properties: Properties,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, properties: Properties) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            properties,
        }
    }

    /// A node of `node_type` starting from the type's default configuration.
    pub fn from_registry(
        id: impl Into<String>,
        node_type: impl Into<String>,
        registry: &NodeRegistry,
    ) -> Self {
        let node_type = node_type.into();
        let properties = registry.default_properties(&node_type);
        Self::new(id, node_type, properties)
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Directed edge: the output of `from` is an input of `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub id: String,
    #[serde(deserialize_with = "endpoint")]
    pub from: String,
    #[serde(deserialize_with = "endpoint")]
    pub to: String,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            id: Self::id_for(&from, &to),
            from,
            to,
        }
    }

    /// Connection ids are derived from the ordered `(from, to)` pair.
    pub fn id_for(from: &str, to: &str) -> String {
        format!("{from}_{to}")
    }
}

/// Editor documents store an endpoint either as a bare node id or as
/// `{ "nodeId": ..., "port": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum EndpointRepr {
    Id(String),
    Port {
        #[serde(rename = "nodeId")]
        node_id: String,
    },
}

fn endpoint<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match EndpointRepr::deserialize(deserializer)? {
        EndpointRepr::Id(id) => id,
        EndpointRepr::Port { node_id } => node_id,
    })
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

fn default_name() -> String {
    "Untitled workflow".to_owned()
}

fn default_version() -> String {
    "1.0".to_owned()
}

/// A complete workflow graph.
///
/// `nodes` and `connections` keep insertion order; scheduling and the
/// `prev.` shortcut both depend on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Convenience constructor for testing.
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, connections: Vec<Connection>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: default_version(),
            nodes,
            connections,
            created_at: now,
            updated_at: now,
        }
    }

    /// Parse an editor workflow document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut workflow: Workflow = serde_json::from_str(text)?;
        for conn in &mut workflow.connections {
            if conn.id.is_empty() {
                conn.id = Connection::id_for(&conn.from, &conn.to);
            }
        }
        Ok(workflow)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Ids of the direct predecessors of `id`, in connection order.
    pub fn predecessors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.connections
            .iter()
            .filter(move |c| c.to == id)
            .map(|c| c.from.as_str())
    }

    // -----------------------------------------------------------------------
    // Editing helpers (the rules the editor enforces on user actions)
    // -----------------------------------------------------------------------

    /// Append a node.
    ///
    /// # Errors
    /// [`EngineError::DuplicateNodeId`] if the id is taken.
    pub fn add_node(&mut self, node: Node) -> Result<(), EngineError> {
        if self.node(&node.id).is_some() {
            return Err(EngineError::DuplicateNodeId(node.id));
        }
        self.nodes.push(node);
        self.touch();
        Ok(())
    }

    /// Remove a node and every connection touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<Node, EngineError> {
        let pos = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| EngineError::UnknownNode(id.to_owned()))?;
        self.connections.retain(|c| c.from != id && c.to != id);
        self.touch();
        Ok(self.nodes.remove(pos))
    }

    /// Connect `from → to` and return the new connection's id.
    ///
    /// # Errors
    /// - [`EngineError::SelfLoop`] if `from == to`.
    /// - [`EngineError::UnknownNodeReference`] if either end is missing.
    /// - [`EngineError::DuplicateConnection`] if the ordered pair exists.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<String, EngineError> {
        if from == to {
            return Err(EngineError::SelfLoop(from.to_owned()));
        }
        for (node_id, side) in [(from, "from"), (to, "to")] {
            if self.node(node_id).is_none() {
                return Err(EngineError::UnknownNodeReference {
                    node_id: node_id.to_owned(),
                    side,
                });
            }
        }
        let id = Connection::id_for(from, to);
        if self.connections.iter().any(|c| c.id == id) {
            return Err(EngineError::DuplicateConnection(id));
        }
        self.connections.push(Connection::new(from, to));
        self.touch();
        Ok(id)
    }

    pub fn disconnect(&mut self, connection_id: &str) -> Result<Connection, EngineError> {
        let pos = self
            .connections
            .iter()
            .position(|c| c.id == connection_id)
            .ok_or_else(|| EngineError::UnknownConnection(connection_id.to_owned()))?;
        self.touch();
        Ok(self.connections.remove(pos))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

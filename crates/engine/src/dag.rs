//! Scheduling: turns a workflow graph into a sequential execution order.
//!
//! Before ordering, node ids must be unique and every connection must name
//! existing nodes.  Ordering is Kahn's algorithm over node indices; ties
//! are broken by node order and successors are released in connection
//! order, so the same graph always yields the same schedule.

use std::collections::{HashMap, VecDeque};

use crate::{models::Workflow, EngineError};

/// Validate the workflow's graph and return node ids in execution order.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if a connection references a missing node.
/// - [`EngineError::CyclicGraph`] if some nodes can never become ready.
pub fn validate_dag(workflow: &Workflow) -> Result<Vec<String>, EngineError> {
    let index = index_nodes(workflow)?;

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); workflow.nodes.len()];
    let mut pending: Vec<usize> = vec![0; workflow.nodes.len()];
    for conn in &workflow.connections {
        let from = endpoint(&index, &conn.from, "from")?;
        let to = endpoint(&index, &conn.to, "to")?;
        successors[from].push(to);
        pending[to] += 1;
    }

    let mut ready: VecDeque<usize> = (0..workflow.nodes.len())
        .filter(|&i| pending[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(workflow.nodes.len());

    while let Some(i) = ready.pop_front() {
        order.push(workflow.nodes[i].id.clone());
        for &next in &successors[i] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() != workflow.nodes.len() {
        return Err(EngineError::CyclicGraph);
    }
    Ok(order)
}

/// Node id → position in `workflow.nodes`.
fn index_nodes(workflow: &Workflow) -> Result<HashMap<&str, usize>, EngineError> {
    let mut index = HashMap::with_capacity(workflow.nodes.len());
    for (i, node) in workflow.nodes.iter().enumerate() {
        if index.insert(node.id.as_str(), i).is_some() {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }
    Ok(index)
}

fn endpoint(
    index: &HashMap<&str, usize>,
    node_id: &str,
    side: &'static str,
) -> Result<usize, EngineError> {
    index
        .get(node_id)
        .copied()
        .ok_or_else(|| EngineError::UnknownNodeReference {
            node_id: node_id.to_owned(),
            side,
        })
}

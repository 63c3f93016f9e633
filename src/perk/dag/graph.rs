// SPDX-License-Identifier: MIT

//! Graph storage: nodes plus the parent-to-children adjacency list

use super::node::Node;
use crate::perk::error::BuildError;
use std::collections::HashMap;
use std::sync::Arc;

/// The compiled decision graph.
///
/// Immutable once built; hot-reload constructs a new `Graph` and swaps the
/// engine's atomic pointer. Child order is preserved from the source
/// document, which fixes the evaluation order.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: HashMap<String, Arc<Node>>,
    children: HashMap<String, Vec<Arc<Node>>>,
    roots: Vec<Arc<Node>>,
}

impl Graph {
    /// Register a node under its id. Scenario nodes also become roots.
    /// Ids are unique; the validator enforces this upstream and the builder
    /// re-checks here.
    pub(crate) fn add_node(&mut self, node: Arc<Node>) -> Result<(), BuildError> {
        let id = node.id().to_string();
        if self.nodes.contains_key(&id) {
            return Err(BuildError::DuplicateId(id));
        }
        if matches!(node.as_ref(), Node::Scenario(_)) {
            self.roots.push(node.clone());
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Record `child` as the next direct successor of `parent_id`.
    pub(crate) fn add_edge(&mut self, parent_id: &str, child: Arc<Node>) {
        self.children
            .entry(parent_id.to_string())
            .or_default()
            .push(child);
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Arc<Node>> {
        self.nodes.get(id)
    }

    /// The ordered direct successors of a node.
    pub fn children(&self, id: &str) -> &[Arc<Node>] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All scenario nodes, in document order. DFS entry points.
    pub fn roots(&self) -> &[Arc<Node>] {
        &self.roots
    }

    /// Total number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perk::dag::node::{ActionNode, ScenarioNode};
    use serde_json::Map;

    #[test]
    fn test_add_node_and_lookup() {
        let mut graph = Graph::default();
        let scenario = Arc::new(Node::Scenario(ScenarioNode::new(
            "sc",
            &["login".to_string()],
            &[],
        )));
        graph.add_node(scenario).unwrap();
        assert!(graph.node("sc").is_some());
        assert_eq!(graph.roots().len(), 1);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut graph = Graph::default();
        let a = Arc::new(Node::Action(ActionNode::new("x", "reward_points", Map::new())));
        let b = Arc::new(Node::Action(ActionNode::new("x", "reward_points", Map::new())));
        graph.add_node(a).unwrap();
        assert!(matches!(
            graph.add_node(b),
            Err(BuildError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_children_preserve_order() {
        let mut graph = Graph::default();
        let first = Arc::new(Node::Action(ActionNode::new("a1", "t", Map::new())));
        let second = Arc::new(Node::Action(ActionNode::new("a2", "t", Map::new())));
        graph.add_node(first.clone()).unwrap();
        graph.add_node(second.clone()).unwrap();
        graph.add_edge("parent", first);
        graph.add_edge("parent", second);
        let ids: Vec<&str> = graph.children("parent").iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[test]
    fn test_children_of_unknown_id_is_empty() {
        let graph = Graph::default();
        assert!(graph.children("nope").is_empty());
    }
}

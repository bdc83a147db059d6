//! Test utilities for Skyplan

use crate::graph::DesignGraph;
use crate::model::{EdgeKind, Node, NodeData, NodeKind};

/// A Lambda service node.
pub fn service(id: &str) -> Node {
    Node::new(id, NodeKind::Service, NodeData::new("lambda", "Lambda"))
}

pub fn vpc(id: &str) -> Node {
    Node::new(id, NodeKind::VpcEnvironment, NodeData::new("vpc", "VPC"))
}

pub fn public_subnet(id: &str) -> Node {
    Node::new(id, NodeKind::PublicSubnet, NodeData::new("public-subnet", "Public Subnet"))
}

pub fn private_subnet(id: &str) -> Node {
    Node::new(id, NodeKind::PrivateSubnet, NodeData::new("private-subnet", "Private Subnet"))
}

/// Build a graph from nodes in order. Panics on duplicate ids.
pub fn graph_of(nodes: Vec<Node>) -> DesignGraph {
    let mut graph = DesignGraph::new();
    for node in nodes {
        let id = node.id.clone();
        assert!(graph.add_node(node), "duplicate node {}", id);
    }
    graph
}

/// The structural invariants every engine operation must preserve.
pub fn assert_invariants(graph: &DesignGraph) {
    for node in graph.nodes() {
        if let Some(parent) = &node.parent_id {
            assert!(graph.contains(parent), "{} has dangling parent {}", node.id, parent);
            assert_ne!(parent, &node.id, "{} is its own parent", node.id);
        }
        assert!(!graph.has_cycle(&node.id), "{} reaches a parent cycle", node.id);
    }
    for edge in graph.edges() {
        assert!(graph.contains(&edge.source), "edge {} has dangling source", edge.id);
        assert!(graph.contains(&edge.target), "edge {} has dangling target", edge.id);
        assert_eq!(edge.kind, EdgeKind::Deletable, "edge {}", edge.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_apply_container_layout() {
        let graph = graph_of(vec![vpc("v"), public_subnet("p").inside("v"), service("s").inside("p")]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.node(&"v".into()).unwrap().z_index, Some(-2));
        assert_eq!(graph.node(&"p".into()).unwrap().z_index, Some(-1));
        assert_eq!(graph.node(&"s".into()).unwrap().z_index, None);
        assert_invariants(&graph);
    }
}

//! Node arena built on petgraph::StableDiGraph, keyed by NodeId/EdgeId

use crate::model::*;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

/// The diagram graph. Nodes and edges live in a flat arena; `parent_id` is a
/// relationship resolved through the id table, never an arena edge.
#[derive(Clone)]
pub struct DesignGraph {
    inner: StableDiGraph<Node, Edge>,
    node_index: HashMap<NodeId, NodeIndex>,
    edge_index: HashMap<EdgeId, EdgeIndex>,
}

impl std::fmt::Debug for DesignGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesignGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl DesignGraph {
    pub fn new() -> Self {
        DesignGraph {
            inner: StableDiGraph::new(),
            node_index: HashMap::new(),
            edge_index: HashMap::new(),
        }
    }

    /// Add a node. Returns false (and leaves the graph untouched) if the id is taken.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.node_index.contains_key(&node.id) {
            return false;
        }
        let id = node.id.clone();
        let idx = self.inner.add_node(node);
        self.node_index.insert(id, idx);
        true
    }

    /// Add an edge. Returns false if either endpoint is missing or the id is taken.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if self.edge_index.contains_key(&edge.id) {
            return false;
        }
        let (Some(&source), Some(&target)) = (
            self.node_index.get(&edge.source),
            self.node_index.get(&edge.target),
        ) else {
            return false;
        };
        let id = edge.id.clone();
        let idx = self.inner.add_edge(source, target, edge);
        self.edge_index.insert(id, idx);
        true
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node_index.contains_key(id)
    }

    /// Get a node by ID.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.node_index
            .get(id)
            .and_then(|&idx| self.inner.node_weight(idx))
    }

    /// Get a mutable node by ID. Callers must not change the node's `id`.
    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        let idx = *self.node_index.get(id)?;
        self.inner.node_weight_mut(idx)
    }

    /// Get an edge by ID.
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edge_index
            .get(id)
            .and_then(|&idx| self.inner.edge_weight(idx))
    }

    pub fn edge_mut(&mut self, id: &EdgeId) -> Option<&mut Edge> {
        let idx = *self.edge_index.get(id)?;
        self.inner.edge_weight_mut(idx)
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    /// Iterate over all nodes in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Iterate over all edges in arena order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// Snapshot of node ids in arena order, for passes that mutate while walking.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|n| n.id.clone()).collect()
    }

    /// All edges with `id` as source or target.
    pub fn edges_of(&self, id: &NodeId) -> Vec<&Edge> {
        let Some(&idx) = self.node_index.get(id) else {
            return Vec::new();
        };
        // Self-loops show up in both directions; count them once.
        self.inner
            .edges_directed(idx, Direction::Outgoing)
            .chain(
                self.inner
                    .edges_directed(idx, Direction::Incoming)
                    .filter(move |edge_ref| edge_ref.source() != idx),
            )
            .filter_map(|edge_ref| self.inner.edge_weight(edge_ref.id()))
            .collect()
    }

    /// Get all nodes of a specific kind.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes().filter(move |n| n.kind == kind)
    }

    /// Check if any edge runs from `source` to `target`.
    pub fn has_edge_between(&self, source: &NodeId, target: &NodeId) -> bool {
        match (self.node_index.get(source), self.node_index.get(target)) {
            (Some(&s), Some(&t)) => self.inner.contains_edge(s, t),
            _ => false,
        }
    }

    /// Remove a node and all its edges.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        let idx = self.node_index.remove(id)?;
        let touching: Vec<EdgeId> = self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.inner.edges_directed(idx, Direction::Incoming))
            .map(|edge_ref| edge_ref.weight().id.clone())
            .collect();
        for edge_id in touching {
            self.edge_index.remove(&edge_id);
        }
        self.inner.remove_node(idx)
    }

    /// Remove an edge by ID.
    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        let idx = self.edge_index.remove(id)?;
        self.inner.remove_edge(idx)
    }

    /// Clone out nodes and edges in arena order.
    pub fn to_parts(&self) -> (Vec<Node>, Vec<Edge>) {
        (self.nodes().cloned().collect(), self.edges().cloned().collect())
    }

    /// Generate the next node ID by scanning existing nodes: "node-{N}".
    pub fn next_node_id(&self) -> NodeId {
        let max = self
            .node_index
            .keys()
            .filter_map(|id| id.0.strip_prefix("node-").and_then(|s| s.parse::<u64>().ok()))
            .max()
            .unwrap_or(0);
        NodeId(format!("node-{}", max + 1))
    }

    /// Edge IDs are derived from their endpoints, with a numeric suffix when
    /// the pair is already connected.
    pub fn next_edge_id(&self, source: &NodeId, target: &NodeId) -> EdgeId {
        let base = format!("edge-{}-{}", source, target);
        if !self.edge_index.contains_key(&EdgeId(base.clone())) {
            return EdgeId(base);
        }
        let mut n = 2u64;
        loop {
            let candidate = EdgeId(format!("{}-{}", base, n));
            if !self.edge_index.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub(crate) fn index_of(&self, id: &NodeId) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    pub(crate) fn node_at(&self, idx: NodeIndex) -> Option<&Node> {
        self.inner.node_weight(idx)
    }
}

impl Default for DesignGraph {
    fn default() -> Self {
        Self::new()
    }
}

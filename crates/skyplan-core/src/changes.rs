//! Positional and selection change batches from the canvas

use crate::graph::DesignGraph;
use crate::model::*;
use serde::{Deserialize, Serialize};

/// A single canvas delta for a node. None of these touch `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeChange {
    /// Drag. `position` is absent for drag-start/end notifications.
    Position {
        id: NodeId,
        #[serde(default)]
        position: Option<Position>,
        #[serde(default)]
        dragging: bool,
    },
    /// Resize.
    Dimensions {
        id: NodeId,
        #[serde(default)]
        dimensions: Option<Dimensions>,
    },
    Select { id: NodeId, selected: bool },
}

/// A single canvas delta for an edge. Edges are deletable, so removal is allowed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgeChange {
    Select { id: EdgeId, selected: bool },
    Remove { id: EdgeId },
}

/// What a batch actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    /// Changes that altered persisted layout or structure.
    pub modified: usize,
    /// Selection-only changes.
    pub selected: usize,
    /// Changes that named an unknown id or carried no payload.
    pub skipped: usize,
}

impl ChangeSummary {
    /// Check if this batch changed anything worth saving.
    pub fn is_modifying(&self) -> bool {
        self.modified > 0
    }
}

pub(crate) fn apply_node_changes(graph: &mut DesignGraph, changes: &[NodeChange]) -> ChangeSummary {
    let mut summary = ChangeSummary::default();
    for change in changes {
        match change {
            NodeChange::Position {
                id,
                position: Some(position),
                ..
            } => match graph.node_mut(id) {
                Some(node) => {
                    node.position = *position;
                    summary.modified += 1;
                }
                None => summary.skipped += 1,
            },
            NodeChange::Dimensions {
                id,
                dimensions: Some(dimensions),
            } => match graph.node_mut(id) {
                Some(node) => {
                    node.dimensions = Some(*dimensions);
                    summary.modified += 1;
                }
                None => summary.skipped += 1,
            },
            NodeChange::Select { id, selected } => match graph.node_mut(id) {
                Some(node) => {
                    node.selected = *selected;
                    summary.selected += 1;
                }
                None => summary.skipped += 1,
            },
            NodeChange::Position { .. } | NodeChange::Dimensions { .. } => summary.skipped += 1,
        }
    }
    summary
}

pub(crate) fn apply_edge_changes(graph: &mut DesignGraph, changes: &[EdgeChange]) -> ChangeSummary {
    let mut summary = ChangeSummary::default();
    for change in changes {
        match change {
            EdgeChange::Select { id, selected } => match graph.edge_mut(id) {
                Some(edge) => {
                    edge.selected = *selected;
                    summary.selected += 1;
                }
                None => summary.skipped += 1,
            },
            EdgeChange::Remove { id } => match graph.remove_edge(id) {
                Some(_) => summary.modified += 1,
                None => summary.skipped += 1,
            },
        }
    }
    summary
}

//! The design document aggregate

use crate::graph::DesignGraph;
use chrono::{DateTime, Utc};

pub const DEFAULT_DESIGN_NAME: &str = "Untitled Design";

/// Nodes and edges plus the bookkeeping that travels with them.
#[derive(Debug, Clone)]
pub struct DesignDocument {
    pub(crate) graph: DesignGraph,
    pub(crate) name: String,
    pub(crate) design_id: Option<String>,
    pub(crate) dirty: bool,
    pub(crate) last_saved_at: Option<DateTime<Utc>>,
}

impl DesignDocument {
    pub fn new() -> Self {
        DesignDocument {
            graph: DesignGraph::new(),
            name: DEFAULT_DESIGN_NAME.to_string(),
            design_id: None,
            dirty: false,
            last_saved_at: None,
        }
    }

    pub(crate) fn from_graph(graph: DesignGraph, name: String, design_id: Option<String>) -> Self {
        DesignDocument {
            graph,
            name,
            design_id,
            dirty: false,
            last_saved_at: None,
        }
    }

    pub fn graph(&self) -> &DesignGraph {
        &self.graph
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier assigned by the last successful save, if any.
    pub fn design_id(&self) -> Option<&str> {
        self.design_id.as_deref()
    }

    /// Unsaved changes since the last `mark_saved`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }
}

impl Default for DesignDocument {
    fn default() -> Self {
        Self::new()
    }
}

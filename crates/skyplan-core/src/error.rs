//! Error types for the design core

use crate::model::{NodeId, NodeKind};
use thiserror::Error;

/// Errors surfaced by the few core operations that can refuse a request.
/// Ordinary mutations never fail; they silently ignore unknown ids.
#[derive(Error, Debug)]
pub enum DesignError {
    /// The referenced node is not in the document
    #[error("node not found: {0}")]
    UnknownNode(NodeId),

    #[error("node {0} cannot be its own parent")]
    SelfParent(NodeId),

    /// The requested parent is already a descendant of the node
    #[error("making {parent} the parent of {node} would create a cycle")]
    WouldCycle { node: NodeId, parent: NodeId },

    /// Rejected by the active containment policy
    #[error("a {parent} node cannot contain a {child} node")]
    ContainmentViolation { parent: NodeKind, child: NodeKind },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for design core operations
pub type Result<T> = std::result::Result<T, DesignError>;

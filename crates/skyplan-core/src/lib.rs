//! Skyplan Core — design document model, mutation engine, hierarchy and persistence

pub mod changes;
pub mod document;
pub mod engine;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod migration;
pub mod model;
pub mod persistence;
pub mod policy;


#[cfg(test)]
pub mod test_utils;

pub use changes::{ChangeSummary, EdgeChange, NodeChange};
pub use document::{DesignDocument, DEFAULT_DESIGN_NAME};
pub use engine::DesignEngine;
pub use error::{DesignError, Result};
pub use graph::DesignGraph;
pub use hierarchy::{SubnetHierarchy, VpcHierarchy};
pub use migration::{migrate, repair, LoadedDesign, RepairReport};
pub use model::{
    CodeLanguage, Dimensions, Edge, EdgeId, EdgeKind, EdgeStyle, Extent, Node, NodeData, NodeDataPatch, NodeId,
    NodeKind, Position, PropertyValue,
};
pub use persistence::{
    DesignStorage, DesignStore, FileStorage, MemoryStorage, StorageConfig, StoredDesign, DEFAULT_RECORD,
    SCHEMA_VERSION, STORAGE_DIR,
};
pub use policy::ContainmentPolicy;

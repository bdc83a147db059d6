//! Core data structures for the architecture diagram

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique, stable identifier for a node. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

/// Unique edge identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        EdgeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        EdgeId(id.to_string())
    }
}

/// Discriminates what a node represents. Drives containment and layout defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    // ── Leaf ────────────────────────────────────────────────
    #[default]
    Service,

    // ── Containers ──────────────────────────────────────────
    VpcEnvironment,
    PublicSubnet,
    PrivateSubnet,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Service => "service",
            NodeKind::VpcEnvironment => "vpc-environment",
            NodeKind::PublicSubnet => "public-subnet",
            NodeKind::PrivateSubnet => "private-subnet",
        }
    }

    /// VPCs and subnets render as frames that other nodes sit inside.
    pub fn is_container(self) -> bool {
        !matches!(self, NodeKind::Service)
    }

    pub fn is_subnet(self) -> bool {
        matches!(self, NodeKind::PublicSubnet | NodeKind::PrivateSubnet)
    }

    /// Default frame size and stacking for container kinds.
    /// Negative z-index keeps containers beneath the nodes they hold.
    pub fn default_layout(self) -> Option<(Dimensions, i32)> {
        match self {
            NodeKind::VpcEnvironment => Some((Dimensions::new(500.0, 400.0), -2)),
            NodeKind::PublicSubnet | NodeKind::PrivateSubnet => {
                Some((Dimensions::new(220.0, 180.0), -1))
            }
            NodeKind::Service => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Dimensions { width, height }
    }
}

/// Layout-extent flag. `Parent` confines a child to its parent's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extent {
    Parent,
}

/// A user-editable property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Number(v as f64)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

/// Descriptive metadata carried by every node. Opaque to the structural invariants,
/// except that `service_id` must be present for a stored node to survive a load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl NodeData {
    pub fn new(service_id: impl Into<String>, service_name: impl Into<String>) -> Self {
        NodeData {
            service_id: service_id.into(),
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Shallow merge: every field present in the patch replaces the current value.
    /// A blank `service_id` is ignored, since the load pass drops nodes without one.
    pub fn merge(&mut self, patch: NodeDataPatch) {
        if let Some(v) = patch.service_id.filter(|v| !v.trim().is_empty()) {
            self.service_id = v;
        }
        if let Some(v) = patch.service_name {
            self.service_name = v;
        }
        if let Some(v) = patch.short_name {
            self.short_name = v;
        }
        if let Some(v) = patch.color {
            self.color = v;
        }
        if let Some(v) = patch.category {
            self.category = v;
        }
        if let Some(v) = patch.properties {
            self.properties = v;
        }
    }
}

/// Partial update for [`NodeData`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, PropertyValue>>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// A positioned entity in the diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: NodeData,
    /// Weak back-reference to the containing node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<Extent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
}

impl Node {
    /// Build a root node. Container kinds get their default frame and z-index.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, data: NodeData) -> Self {
        let layout = kind.default_layout();
        Node {
            id: id.into(),
            kind,
            position: Position::default(),
            data,
            parent_id: None,
            extent: None,
            dimensions: layout.map(|(d, _)| d),
            z_index: layout.map(|(_, z)| z),
            selected: false,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn inside(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent.into());
        self.extent = Some(Extent::Parent);
        self
    }

    /// Drop the parent link together with its extent flag.
    pub fn detach(&mut self) -> Option<NodeId> {
        self.extent = None;
        self.parent_id.take()
    }
}

/// Interaction kind of an edge. Only `Deletable` is ever created by the core;
/// the others exist so documents written by older versions still decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeKind {
    Deletable,
    Plain,
    Straight,
    Step,
    SmoothStep,
    Custom(String),
}

impl From<String> for EdgeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "deletable" => EdgeKind::Deletable,
            "default" => EdgeKind::Plain,
            "straight" => EdgeKind::Straight,
            "step" => EdgeKind::Step,
            "smoothstep" => EdgeKind::SmoothStep,
            _ => EdgeKind::Custom(s),
        }
    }
}

impl From<EdgeKind> for String {
    fn from(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Deletable => "deletable".to_string(),
            EdgeKind::Plain => "default".to_string(),
            EdgeKind::Straight => "straight".to_string(),
            EdgeKind::Step => "step".to_string(),
            EdgeKind::SmoothStep => "smoothstep".to_string(),
            EdgeKind::Custom(s) => s,
        }
    }
}

fn plain_edge_kind() -> EdgeKind {
    EdgeKind::Plain
}

/// Display styling for edges. The default is the fixed style `connect` applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke: String,
    pub stroke_width: f64,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        EdgeStyle {
            stroke: "#6366f1".to_string(),
            stroke_width: 2.0,
        }
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    #[serde(alias = "sourceId")]
    pub source: NodeId,
    #[serde(alias = "targetId")]
    pub target: NodeId,
    /// An untyped edge is the renderer's plain edge.
    #[serde(rename = "type", default = "plain_edge_kind")]
    pub kind: EdgeKind,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
}

impl Edge {
    /// The only shape of edge the engine creates.
    pub fn deletable(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Edge {
            id,
            source,
            target,
            kind: EdgeKind::Deletable,
            animated: true,
            style: EdgeStyle::default(),
            selected: false,
        }
    }

    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }
}

/// Target language for the external code generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    #[default]
    Terraform,
    Pulumi,
}

//! Mutation engine: the single owner of the design document
//!
//! Every operation is synchronous and total. Operations naming an unknown id
//! are logged and ignored rather than reported, since canvas events can race
//! with state that has already moved on. When a [`DesignStore`] is attached,
//! each document mutation writes a snapshot; write failures are logged and
//! never reach the caller.

use crate::changes::{self, ChangeSummary, EdgeChange, NodeChange};
use crate::document::DesignDocument;
use crate::error::Result;
use crate::graph::DesignGraph;
use crate::hierarchy::VpcHierarchy;
use crate::migration::{self, RepairReport};
use crate::model::*;
use crate::persistence::DesignStore;
use crate::policy::ContainmentPolicy;

pub struct DesignEngine {
    document: DesignDocument,
    selected_node: Option<NodeId>,
    panel_open: bool,
    language: CodeLanguage,
    policy: ContainmentPolicy,
    store: Option<DesignStore>,
    last_repair: Option<RepairReport>,
}

impl std::fmt::Debug for DesignEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesignEngine")
            .field("document", &self.document)
            .field("selected_node", &self.selected_node)
            .field("language", &self.language)
            .field("policy", &self.policy)
            .field("store", &self.store)
            .finish()
    }
}

impl DesignEngine {
    /// An empty, unpersisted design.
    pub fn new() -> Self {
        DesignEngine {
            document: DesignDocument::new(),
            selected_node: None,
            panel_open: false,
            language: CodeLanguage::default(),
            policy: ContainmentPolicy::default(),
            store: None,
            last_repair: None,
        }
    }

    /// Load (and repair) whatever the store holds, then keep persisting to it.
    pub fn with_store(store: DesignStore) -> Self {
        let loaded = store.load();
        tracing::info!(
            "Loaded design '{}' from record '{}': {} nodes, {} edges",
            loaded.document.name(),
            store.record(),
            loaded.document.graph().node_count(),
            loaded.document.graph().edge_count()
        );
        DesignEngine {
            document: loaded.document,
            language: loaded.language,
            store: Some(store),
            last_repair: Some(loaded.report),
            ..Self::new()
        }
    }

    pub fn with_policy(mut self, policy: ContainmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    // ── Read access ─────────────────────────────────────────

    pub fn document(&self) -> &DesignDocument {
        &self.document
    }

    pub fn graph(&self) -> &DesignGraph {
        &self.document.graph
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.document.graph.node(id)
    }

    pub fn selected_node(&self) -> Option<&NodeId> {
        self.selected_node.as_ref()
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn language(&self) -> CodeLanguage {
        self.language
    }

    pub fn policy(&self) -> ContainmentPolicy {
        self.policy
    }

    /// Report from the most recent load, if the document came from storage
    /// or `load_design`.
    pub fn last_repair(&self) -> Option<&RepairReport> {
        self.last_repair.as_ref()
    }

    pub fn children(&self, parent: &NodeId) -> Vec<&Node> {
        self.document.graph.children(parent)
    }

    /// The nested VPC view handed to the Terraform/Pulumi generators.
    pub fn vpc_hierarchy(&self) -> Vec<VpcHierarchy<'_>> {
        self.document.graph.vpc_hierarchy()
    }

    pub fn next_node_id(&self) -> NodeId {
        self.document.graph.next_node_id()
    }

    // ── Mutations ───────────────────────────────────────────

    /// Append a node. Ids are the caller's responsibility; a taken id is ignored.
    /// A `parent_id` naming a missing node, the node itself, or a node that
    /// would close a loop is dropped together with its extent.
    pub fn add_node(&mut self, mut node: Node) {
        let id = node.id.clone();
        if self.document.graph.contains(&id) {
            tracing::warn!("Ignoring add_node for existing id {}", id);
            return;
        }
        if let Some(parent) = node.parent_id.as_ref() {
            if parent == &id || !self.document.graph.contains(parent) {
                tracing::warn!("add_node: dropping unresolvable parent {} of {}", parent, id);
                node.detach();
            }
        }
        if !self.document.graph.add_node(node) {
            return;
        }
        if self.document.graph.is_on_cycle(&id) {
            if let Some(parent) = self.document.graph.node_mut(&id).and_then(Node::detach) {
                tracing::warn!("add_node: dropping parent {} of {}, it would close a loop", parent, id);
            }
        }
        tracing::debug!("Added node {}", id);
        self.commit();
    }

    /// Remove one node and its edges. Its direct children are detached, not removed.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        let Some(removed) = self.document.graph.remove_node(id) else {
            tracing::debug!("remove_node: no node {}", id);
            return None;
        };
        let orphans: Vec<NodeId> = self.document.graph.children(id).iter().map(|n| n.id.clone()).collect();
        for child in &orphans {
            if let Some(node) = self.document.graph.node_mut(child) {
                node.detach();
            }
        }
        self.clear_selection_of(std::iter::once(id));
        tracing::debug!("Removed node {}", id);
        self.commit();
        Some(removed)
    }

    /// Remove a node, every transitive descendant, and all their edges.
    /// Returns the removed ids, root first.
    pub fn remove_node_with_children(&mut self, id: &NodeId) -> Vec<NodeId> {
        if !self.document.graph.contains(id) {
            tracing::debug!("remove_node_with_children: no node {}", id);
            return Vec::new();
        }
        let mut doomed = vec![id.clone()];
        doomed.extend(self.document.graph.descendants(id));
        for node_id in &doomed {
            self.document.graph.remove_node(node_id);
        }
        self.clear_selection_of(&doomed);
        tracing::debug!("Removed {} with {} descendants", id, doomed.len() - 1);
        self.commit();
        doomed
    }

    /// Shallow-merge descriptive metadata.
    pub fn update_node_data(&mut self, id: &NodeId, patch: NodeDataPatch) {
        let Some(node) = self.document.graph.node_mut(id) else {
            tracing::debug!("update_node_data: no node {}", id);
            return;
        };
        node.data.merge(patch);
        self.commit();
    }

    /// Set a single entry of the node's `properties`.
    pub fn update_node_property(&mut self, id: &NodeId, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let Some(node) = self.document.graph.node_mut(id) else {
            tracing::debug!("update_node_property: no node {}", id);
            return;
        };
        node.data.properties.insert(key.into(), value.into());
        self.commit();
    }

    /// Connect two nodes with a deletable, animated edge. The only way edges are created.
    pub fn connect(&mut self, source: &NodeId, target: &NodeId) -> Option<EdgeId> {
        let graph = &mut self.document.graph;
        let id = graph.next_edge_id(source, target);
        if !graph.add_edge(Edge::deletable(id.clone(), source.clone(), target.clone())) {
            tracing::debug!("connect: missing endpoint in {} -> {}", source, target);
            return None;
        }
        self.commit();
        Some(id)
    }

    /// Assign or clear a node's parent. Cycles and self-parenting are refused
    /// here, as is anything the engine's containment policy forbids. Unknown
    /// ids are ignored like in every other mutation.
    pub fn set_parent(&mut self, id: &NodeId, parent: Option<&NodeId>) -> Result<()> {
        let graph = &self.document.graph;
        if !graph.contains(id) || parent.is_some_and(|p| !graph.contains(p)) {
            tracing::debug!("set_parent: unknown node in {} -> {:?}", id, parent);
            return Ok(());
        }
        if let Err(e) = self.document.graph.assign_parent(id, parent, self.policy) {
            tracing::warn!("set_parent({}) refused: {}", id, e);
            return Err(e);
        }
        self.commit();
        Ok(())
    }

    /// Drag/resize/select deltas. Only layout changes mark the design dirty.
    pub fn apply_node_changes(&mut self, changes: &[NodeChange]) -> ChangeSummary {
        let summary = changes::apply_node_changes(&mut self.document.graph, changes);
        if summary.is_modifying() {
            self.commit();
        }
        summary
    }

    /// Edge select/remove deltas.
    pub fn apply_edge_changes(&mut self, changes: &[EdgeChange]) -> ChangeSummary {
        let summary = changes::apply_edge_changes(&mut self.document.graph, changes);
        if summary.is_modifying() {
            self.commit();
        }
        summary
    }

    /// Exclusive selection; opens the side panel when a node is selected.
    pub fn select_node(&mut self, id: Option<&NodeId>) {
        match id {
            Some(id) if !self.document.graph.contains(id) => {
                tracing::debug!("select_node: no node {}", id);
            }
            Some(id) => {
                self.selected_node = Some(id.clone());
                self.panel_open = true;
            }
            None => {
                self.selected_node = None;
                self.panel_open = false;
            }
        }
    }

    pub fn set_design_name(&mut self, name: impl Into<String>) {
        self.document.name = name.into();
        self.commit();
    }

    /// Code-generation language preference. Persisted, but not a document change.
    pub fn set_language(&mut self, language: CodeLanguage) {
        self.language = language;
        self.persist();
    }

    /// Back to an empty, clean document.
    pub fn clear_canvas(&mut self) {
        self.document = DesignDocument::new();
        self.selected_node = None;
        self.panel_open = false;
        self.last_repair = None;
        tracing::debug!("Canvas cleared");
        self.persist();
    }

    /// Replace the document wholesale. The input passes through the same
    /// repair as stored data, so every edge comes out `deletable` and no
    /// parent link dangles.
    pub fn load_design(
        &mut self,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        name: impl Into<String>,
        design_id: Option<String>,
    ) -> &RepairReport {
        let (graph, report) = migration::repair(nodes, edges);
        self.document = DesignDocument::from_graph(graph, name.into(), design_id);
        self.selected_node = None;
        self.panel_open = false;
        tracing::info!(
            "Loaded design '{}': {} nodes, {} edges",
            self.document.name,
            self.document.graph.node_count(),
            self.document.graph.edge_count()
        );
        self.persist();
        self.last_repair.insert(report)
    }

    /// Record a successful save under `design_id`.
    pub fn mark_saved(&mut self, design_id: impl Into<String>) {
        self.document.design_id = Some(design_id.into());
        self.document.dirty = false;
        self.document.last_saved_at = Some(chrono::Utc::now());
        self.persist();
    }

    // ── Internals ───────────────────────────────────────────

    fn clear_selection_of<'a>(&mut self, removed: impl IntoIterator<Item = &'a NodeId>) {
        let Some(selected) = self.selected_node.as_ref() else {
            return;
        };
        if removed.into_iter().any(|id| id == selected) {
            self.selected_node = None;
            self.panel_open = false;
        }
    }

    /// Mark dirty and persist.
    fn commit(&mut self) {
        self.document.dirty = true;
        self.persist();
    }

    fn persist(&self) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.save(&self.document, self.language) {
            tracing::warn!("Failed to persist design to '{}': {}", store.record(), e);
        }
    }
}

impl Default for DesignEngine {
    fn default() -> Self {
        Self::new()
    }
}

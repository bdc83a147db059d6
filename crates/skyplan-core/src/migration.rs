//! Load-time repair of stored designs
//!
//! Stored snapshots may come from older schema versions or from a partial
//! write. Loading never fails: the pipeline below always yields a document
//! that satisfies the structural invariants, and a [`RepairReport`] listing
//! everything it had to drop or detach.
//!
//! 1. Version gate: older or unversioned snapshots are discarded wholesale.
//! 2. Structural validation: nodes without a `serviceId` are dropped.
//! 3. Parent repair: dangling, self and cyclic `parentId`s are cleared.
//! 4. Layout backfill: container defaults for missing dimensions / z-index.
//! 5. Edge normalization: every edge becomes `deletable`; dangling edges go.

use crate::document::{DesignDocument, DEFAULT_DESIGN_NAME};
use crate::graph::DesignGraph;
use crate::model::*;
use crate::persistence::{StoredDesign, SCHEMA_VERSION};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeDropReason {
    /// Could not be decoded as a node at all.
    Malformed,
    MissingServiceId,
    DuplicateId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetachReason {
    MissingParent,
    SelfParent,
    Cycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeDropReason {
    Malformed,
    DanglingEndpoint,
    DuplicateId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedNode {
    pub id: Option<String>,
    pub reason: NodeDropReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetachedParent {
    pub node: NodeId,
    pub parent: NodeId,
    pub reason: DetachReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedEdge {
    pub id: Option<String>,
    pub reason: EdgeDropReason,
}

/// Everything the load pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub stored_version: Option<u32>,
    /// The record existed but could not be parsed.
    pub unreadable_record: bool,
    pub discarded_by_version: bool,
    pub dropped_nodes: Vec<DroppedNode>,
    pub detached_parents: Vec<DetachedParent>,
    pub backfilled_layout: Vec<NodeId>,
    /// Edges whose stored kind was rewritten to `deletable`.
    pub normalized_edges: usize,
    pub dropped_edges: Vec<DroppedEdge>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        !self.unreadable_record
            && !self.discarded_by_version
            && self.dropped_nodes.is_empty()
            && self.detached_parents.is_empty()
            && self.backfilled_layout.is_empty()
            && self.normalized_edges == 0
            && self.dropped_edges.is_empty()
    }

    /// Anything that lost user data, as opposed to cosmetic fixes.
    pub fn lost_data(&self) -> bool {
        self.discarded_by_version
            || self.unreadable_record
            || !self.dropped_nodes.is_empty()
            || !self.dropped_edges.is_empty()
    }

    fn log_summary(&self) {
        if self.lost_data() {
            tracing::warn!(
                "Design repaired with data loss: discarded={} dropped_nodes={} dropped_edges={} detached={}",
                self.discarded_by_version,
                self.dropped_nodes.len(),
                self.dropped_edges.len(),
                self.detached_parents.len()
            );
        } else if !self.is_clean() {
            tracing::info!(
                "Design repaired: detached={} backfilled={} normalized_edges={}",
                self.detached_parents.len(),
                self.backfilled_layout.len(),
                self.normalized_edges
            );
        }
    }
}

/// Result of loading a stored design.
#[derive(Debug, Clone)]
pub struct LoadedDesign {
    pub document: DesignDocument,
    pub language: CodeLanguage,
    pub report: RepairReport,
}

impl LoadedDesign {
    pub fn empty() -> Self {
        LoadedDesign {
            document: DesignDocument::new(),
            language: CodeLanguage::default(),
            report: RepairReport::default(),
        }
    }
}

/// Run the full pipeline over a stored record.
pub fn migrate(stored: StoredDesign) -> LoadedDesign {
    let language = stored.language_preference.unwrap_or_default();
    let mut report = RepairReport {
        stored_version: stored.schema_version,
        ..Default::default()
    };

    match stored.schema_version {
        Some(version) if version >= SCHEMA_VERSION => {
            if version > SCHEMA_VERSION {
                tracing::warn!(
                    "Stored design has schema version {} (newer than {}), loading as-is",
                    version,
                    SCHEMA_VERSION
                );
            }
        }
        other => {
            tracing::warn!(
                "Discarding stored design with schema version {:?} (current {})",
                other,
                SCHEMA_VERSION
            );
            report.discarded_by_version = true;
            report.log_summary();
            return LoadedDesign {
                document: DesignDocument::new(),
                language,
                report,
            };
        }
    }

    let nodes = decode_nodes(stored.nodes, &mut report);
    let edges = decode_edges(stored.edges, &mut report);
    let graph = repair_into(nodes, edges, &mut report);

    let name = stored
        .design_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DESIGN_NAME.to_string());
    report.log_summary();

    LoadedDesign {
        document: DesignDocument::from_graph(graph, name, stored.design_id),
        language,
        report,
    }
}

/// Steps 2-5 over already-decoded nodes and edges.
pub fn repair(nodes: Vec<Node>, edges: Vec<Edge>) -> (DesignGraph, RepairReport) {
    let mut report = RepairReport::default();
    let graph = repair_into(nodes, edges, &mut report);
    report.log_summary();
    (graph, report)
}

fn raw_id(value: &serde_json::Value) -> Option<String> {
    value.get("id").and_then(|v| v.as_str()).map(str::to_string)
}

fn decode_nodes(raw: Vec<serde_json::Value>, report: &mut RepairReport) -> Vec<Node> {
    raw.into_iter()
        .filter_map(|value| {
            let id = raw_id(&value);
            match serde_json::from_value::<Node>(value) {
                Ok(node) => Some(node),
                Err(e) => {
                    tracing::warn!("Dropping undecodable node {:?}: {}", id, e);
                    report.dropped_nodes.push(DroppedNode {
                        id,
                        reason: NodeDropReason::Malformed,
                    });
                    None
                }
            }
        })
        .collect()
}

fn decode_edges(raw: Vec<serde_json::Value>, report: &mut RepairReport) -> Vec<Edge> {
    raw.into_iter()
        .filter_map(|value| {
            let id = raw_id(&value);
            match serde_json::from_value::<Edge>(value) {
                Ok(edge) => Some(edge),
                Err(e) => {
                    tracing::warn!("Dropping undecodable edge {:?}: {}", id, e);
                    report.dropped_edges.push(DroppedEdge {
                        id,
                        reason: EdgeDropReason::Malformed,
                    });
                    None
                }
            }
        })
        .collect()
}

fn repair_into(nodes: Vec<Node>, edges: Vec<Edge>, report: &mut RepairReport) -> DesignGraph {
    let mut graph = DesignGraph::new();

    // Structural validation
    for node in nodes {
        if node.data.service_id.trim().is_empty() {
            tracing::warn!("Dropping node {} without a service id", node.id);
            report.dropped_nodes.push(DroppedNode {
                id: Some(node.id.0),
                reason: NodeDropReason::MissingServiceId,
            });
            continue;
        }
        let id = node.id.clone();
        if !graph.add_node(node) {
            tracing::warn!("Dropping duplicate node {}", id);
            report.dropped_nodes.push(DroppedNode {
                id: Some(id.0),
                reason: NodeDropReason::DuplicateId,
            });
        }
    }

    // Dangling and self references
    for id in graph.node_ids() {
        let Some(node) = graph.node(&id) else { continue };
        let reason = match node.parent_id.as_ref() {
            None => {
                if node.extent.is_some() {
                    if let Some(n) = graph.node_mut(&id) {
                        n.extent = None;
                    }
                }
                continue;
            }
            Some(parent) if parent == &id => DetachReason::SelfParent,
            Some(parent) if !graph.contains(parent) => DetachReason::MissingParent,
            Some(_) => continue,
        };
        detach(&mut graph, &id, reason, report);
    }

    // Cycles: break each loop at its first member in document order
    for id in graph.node_ids() {
        if graph.is_on_cycle(&id) {
            detach(&mut graph, &id, DetachReason::Cycle, report);
        }
    }

    // Layout backfill
    for id in graph.node_ids() {
        let Some(node) = graph.node_mut(&id) else { continue };
        let Some((dimensions, z_index)) = node.kind.default_layout() else {
            continue;
        };
        let mut backfilled = false;
        if node.dimensions.is_none() {
            node.dimensions = Some(dimensions);
            backfilled = true;
        }
        if node.z_index.is_none() {
            node.z_index = Some(z_index);
            backfilled = true;
        }
        if backfilled {
            tracing::debug!("Backfilled container layout for {}", id);
            report.backfilled_layout.push(id);
        }
    }

    // Edge normalization
    for mut edge in edges {
        if edge.kind != EdgeKind::Deletable {
            edge.kind = EdgeKind::Deletable;
            report.normalized_edges += 1;
        }
        let id = edge.id.clone();
        let reason = if !graph.contains(&edge.source) || !graph.contains(&edge.target) {
            EdgeDropReason::DanglingEndpoint
        } else if graph.add_edge(edge) {
            continue;
        } else {
            EdgeDropReason::DuplicateId
        };
        tracing::warn!("Dropping edge {}: {:?}", id, reason);
        report.dropped_edges.push(DroppedEdge {
            id: Some(id.0),
            reason,
        });
    }

    graph
}

fn detach(graph: &mut DesignGraph, id: &NodeId, reason: DetachReason, report: &mut RepairReport) {
    let Some(parent) = graph.node_mut(id).and_then(Node::detach) else {
        return;
    };
    tracing::warn!("Detached {} from parent {} ({:?})", id, parent, reason);
    report.detached_parents.push(DetachedParent {
        node: id.clone(),
        parent,
        reason,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(version: Option<u32>, nodes: serde_json::Value, edges: serde_json::Value) -> StoredDesign {
        serde_json::from_value(json!({
            "nodes": nodes,
            "edges": edges,
            "designName": "Legacy",
            "designId": "d-42",
            "languagePreference": "pulumi",
            "schemaVersion": version,
        }))
        .unwrap()
    }

    fn raw_node(id: &str, kind: &str, parent: Option<&str>) -> serde_json::Value {
        let mut node = json!({
            "id": id,
            "type": kind,
            "position": { "x": 0.0, "y": 0.0 },
            "data": { "serviceId": format!("svc-{}", id), "serviceName": id },
        });
        if let Some(parent) = parent {
            node["parentId"] = json!(parent);
            node["extent"] = json!("parent");
        }
        node
    }

    fn assert_structurally_sound(graph: &DesignGraph) {
        for node in graph.nodes() {
            if let Some(parent) = &node.parent_id {
                assert!(graph.contains(parent), "{} has dangling parent {}", node.id, parent);
            }
            assert!(!graph.has_cycle(&node.id), "{} is in a parent cycle", node.id);
        }
        for edge in graph.edges() {
            assert!(graph.contains(&edge.source) && graph.contains(&edge.target));
            assert_eq!(edge.kind, EdgeKind::Deletable);
        }
    }

    #[test]
    fn test_current_version_keeps_data() {
        let loaded = migrate(stored(
            Some(SCHEMA_VERSION),
            json!([raw_node("A", "vpc-environment", None), raw_node("B", "service", Some("A"))]),
            json!([]),
        ));
        assert!(!loaded.report.discarded_by_version);
        assert_eq!(loaded.document.graph().node_count(), 2);
        assert_eq!(loaded.document.name(), "Legacy");
        assert_eq!(loaded.document.design_id(), Some("d-42"));
        assert_eq!(loaded.language, CodeLanguage::Pulumi);
        assert!(!loaded.document.is_dirty());
    }

    #[test]
    fn test_older_or_missing_version_is_discarded() {
        for version in [None, Some(0), Some(SCHEMA_VERSION - 1)] {
            let loaded = migrate(stored(
                version,
                json!([raw_node("A", "service", None)]),
                json!([]),
            ));
            assert!(loaded.report.discarded_by_version, "version {:?}", version);
            assert!(loaded.document.graph().is_empty());
            assert_eq!(loaded.document.name(), DEFAULT_DESIGN_NAME);
            assert_eq!(loaded.document.design_id(), None);
            // The language preference survives the reset.
            assert_eq!(loaded.language, CodeLanguage::Pulumi);
        }
    }

    #[test]
    fn test_newer_version_loads() {
        let loaded = migrate(stored(
            Some(SCHEMA_VERSION + 1),
            json!([raw_node("A", "service", None)]),
            json!([]),
        ));
        assert!(!loaded.report.discarded_by_version);
        assert_eq!(loaded.document.graph().node_count(), 1);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let first = migrate(stored(
            Some(SCHEMA_VERSION),
            json!([
                raw_node("A", "vpc-environment", Some("ghost")),
                raw_node("B", "public-subnet", Some("A")),
            ]),
            json!([{ "id": "e", "source": "A", "target": "B", "type": "smoothstep" }]),
        ));
        assert!(!first.report.is_clean());

        let again = StoredDesign::capture(&first.document, first.language).unwrap();
        let second = migrate(again);
        assert!(second.report.is_clean(), "{:?}", second.report);
        assert_eq!(
            second.document.graph().to_parts(),
            first.document.graph().to_parts()
        );
    }

    #[test]
    fn test_drops_nodes_without_service_id() {
        let mut blank = raw_node("B", "service", None);
        blank["data"]["serviceId"] = json!("");
        let mut missing = raw_node("C", "service", None);
        missing["data"] = json!({ "serviceName": "C" });
        let loaded = migrate(stored(
            Some(SCHEMA_VERSION),
            json!([
                raw_node("A", "service", None),
                blank,
                missing,
                { "type": "service", "data": { "serviceId": "x" } },
                raw_node("A", "service", None),
            ]),
            json!([]),
        ));

        let ids: Vec<_> = loaded.document.graph().nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A"]);
        let reasons: Vec<_> = loaded.report.dropped_nodes.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                NodeDropReason::Malformed,
                NodeDropReason::MissingServiceId,
                NodeDropReason::MissingServiceId,
                NodeDropReason::DuplicateId,
            ]
        );
        assert_eq!(loaded.report.dropped_nodes[0].id, None);
    }

    #[test]
    fn test_detaches_dangling_self_and_dropped_parents() {
        let mut orphaned = raw_node("child", "service", Some("corrupt"));
        orphaned["data"]["serviceId"] = json!("svc");
        let mut corrupt = raw_node("corrupt", "public-subnet", None);
        corrupt["data"]["serviceId"] = json!(null);
        let loaded = migrate(stored(
            Some(SCHEMA_VERSION),
            json!([
                raw_node("A", "service", Some("ghost")),
                raw_node("S", "service", Some("S")),
                corrupt,
                orphaned,
            ]),
            json!([]),
        ));

        let graph = loaded.document.graph();
        assert_structurally_sound(graph);
        for id in ["A", "S", "child"] {
            let node = graph.node(&id.into()).unwrap();
            assert!(node.parent_id.is_none(), "{id}");
            assert!(node.extent.is_none(), "{id}");
        }
        let reasons: Vec<_> = loaded
            .report
            .detached_parents
            .iter()
            .map(|d| (d.node.as_str(), d.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("A", DetachReason::MissingParent),
                ("S", DetachReason::SelfParent),
                ("child", DetachReason::MissingParent),
            ]
        );
    }

    #[test]
    fn test_breaks_stored_two_cycle() {
        let loaded = migrate(stored(
            Some(SCHEMA_VERSION),
            json!([
                raw_node("A", "service", Some("B")),
                raw_node("B", "service", Some("A")),
                raw_node("C", "service", Some("B")),
            ]),
            json!([]),
        ));

        let graph = loaded.document.graph();
        assert_structurally_sound(graph);
        // The first loop member in document order loses its parent.
        assert!(graph.node(&"A".into()).unwrap().parent_id.is_none());
        assert_eq!(graph.node(&"B".into()).unwrap().parent_id, Some(NodeId::from("A")));
        assert_eq!(graph.node(&"C".into()).unwrap().parent_id, Some(NodeId::from("B")));
        assert_eq!(
            loaded.report.detached_parents,
            vec![DetachedParent {
                node: "A".into(),
                parent: "B".into(),
                reason: DetachReason::Cycle,
            }]
        );
    }

    #[test]
    fn test_backfills_container_layout() {
        let mut sized = raw_node("V2", "vpc-environment", None);
        sized["dimensions"] = json!({ "width": 900.0, "height": 700.0 });
        let loaded = migrate(stored(
            Some(SCHEMA_VERSION),
            json!([
                raw_node("V", "vpc-environment", None),
                raw_node("P", "private-subnet", Some("V")),
                raw_node("S", "service", Some("P")),
                sized,
            ]),
            json!([]),
        ));

        let graph = loaded.document.graph();
        let v = graph.node(&"V".into()).unwrap();
        assert_eq!(v.dimensions, Some(Dimensions::new(500.0, 400.0)));
        assert_eq!(v.z_index, Some(-2));
        let p = graph.node(&"P".into()).unwrap();
        assert_eq!(p.dimensions, Some(Dimensions::new(220.0, 180.0)));
        assert_eq!(p.z_index, Some(-1));
        let s = graph.node(&"S".into()).unwrap();
        assert_eq!(s.dimensions, None);
        assert_eq!(s.z_index, None);
        let v2 = graph.node(&"V2".into()).unwrap();
        assert_eq!(v2.dimensions, Some(Dimensions::new(900.0, 700.0)));
        assert_eq!(v2.z_index, Some(-2));

        let backfilled: Vec<_> = loaded.report.backfilled_layout.iter().map(|id| id.as_str()).collect();
        assert_eq!(backfilled, vec!["V", "P", "V2"]);
    }

    #[test]
    fn test_normalizes_and_prunes_edges() {
        let loaded = migrate(stored(
            Some(SCHEMA_VERSION),
            json!([raw_node("A", "service", None), raw_node("B", "service", None)]),
            json!([
                { "id": "e1", "source": "A", "target": "B", "type": "smoothstep" },
                { "id": "e2", "sourceId": "B", "targetId": "A" },
                { "id": "e3", "source": "A", "target": "B", "type": "deletable" },
                { "id": "e4", "source": "A", "target": "gone", "type": "deletable" },
                { "id": "e1", "source": "B", "target": "A", "type": "custom-wire" },
                { "source": "A" },
            ]),
        ));

        let graph = loaded.document.graph();
        assert_structurally_sound(graph);
        let ids: Vec<_> = graph.edges().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2", "e3"]);
        assert_eq!(graph.edge(&"e2".into()).unwrap().source, NodeId::from("B"));
        assert_eq!(loaded.report.normalized_edges, 3);
        let reasons: Vec<_> = loaded.report.dropped_edges.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                EdgeDropReason::Malformed,
                EdgeDropReason::DanglingEndpoint,
                EdgeDropReason::DuplicateId,
            ]
        );
    }

    #[test]
    fn test_blank_name_falls_back_to_default() {
        let mut record = stored(Some(SCHEMA_VERSION), json!([]), json!([]));
        record.design_name = Some("   ".to_string());
        assert_eq!(migrate(record).document.name(), DEFAULT_DESIGN_NAME);
    }
}

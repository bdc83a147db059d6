//! Parent/child hierarchy derived from `parent_id`: traversal, cycle
//! detection, and the nested VPC view consumed by the code generators.

use crate::error::{DesignError, Result};
use crate::graph::DesignGraph;
use crate::model::{Extent, Node, NodeId, NodeKind};
use crate::policy::ContainmentPolicy;
use petgraph::stable_graph::NodeIndex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// One VPC with its subnets partitioned by visibility.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcHierarchy<'a> {
    pub vpc: &'a Node,
    pub public_subnets: Vec<SubnetHierarchy<'a>>,
    pub private_subnets: Vec<SubnetHierarchy<'a>>,
}

/// A subnet and the nodes placed directly inside it.
#[derive(Debug, Clone, Serialize)]
pub struct SubnetHierarchy<'a> {
    pub subnet: &'a Node,
    pub services: Vec<&'a Node>,
}

impl DesignGraph {
    /// Parent index of `idx`, if its parent resolves.
    fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        let parent = self.node_at(idx)?.parent_id.as_ref()?;
        self.index_of(parent)
    }

    /// Parent -> direct children, both in arena order.
    fn child_map(&self) -> HashMap<&NodeId, Vec<&Node>> {
        let mut map: HashMap<&NodeId, Vec<&Node>> = HashMap::new();
        for node in self.nodes() {
            if let Some(parent) = node.parent_id.as_ref() {
                map.entry(parent).or_default().push(node);
            }
        }
        map
    }

    /// Nodes whose `parent_id` equals `parent`. Single level.
    pub fn children(&self, parent: &NodeId) -> Vec<&Node> {
        self.nodes()
            .filter(|n| n.parent_id.as_ref() == Some(parent))
            .collect()
    }

    /// Nodes with no parent.
    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|n| n.parent_id.is_none())
    }

    /// Every transitive descendant of `id`, breadth-first. Terminates on cyclic data.
    pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
        let children = self.child_map();
        let mut seen: HashSet<&NodeId> = HashSet::from([id]);
        let mut out = Vec::new();
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for child in children.get(current).into_iter().flatten() {
                if seen.insert(&child.id) {
                    out.push(child.id.clone());
                    queue.push_back(&child.id);
                }
            }
        }
        out
    }

    /// Parent chain of `id`, nearest first. Stops at a dangling link or a revisit.
    pub fn ancestors(&self, id: &NodeId) -> Vec<NodeId> {
        let Some(start) = self.index_of(id) else {
            return Vec::new();
        };
        let mut visited = HashSet::from([start]);
        let mut out = Vec::new();
        let mut current = start;
        while let Some(next) = self.parent_index(current) {
            if !visited.insert(next) {
                break;
            }
            if let Some(node) = self.node_at(next) {
                out.push(node.id.clone());
            }
            current = next;
        }
        out
    }

    /// Number of resolvable ancestors; roots are at depth 0.
    pub fn depth(&self, id: &NodeId) -> Option<usize> {
        self.contains(id).then(|| self.ancestors(id).len())
    }

    /// Walk the parent chain of `start` keeping a visited set. If a node is
    /// revisited, returns the ids forming the loop (which include `start`
    /// when the chain returns to it).
    pub fn find_cycle(&self, start: &NodeId) -> Option<Vec<NodeId>> {
        let start_idx = self.index_of(start)?;
        let mut path = vec![start_idx];
        let mut visited = HashSet::from([start_idx]);
        let mut current = start_idx;

        while let Some(next) = self.parent_index(current) {
            if !visited.insert(next) {
                let loop_start = path.iter().position(|&idx| idx == next)?;
                return Some(
                    path[loop_start..]
                        .iter()
                        .filter_map(|&idx| self.node_at(idx))
                        .map(|n| n.id.clone())
                        .collect(),
                );
            }
            path.push(next);
            current = next;
        }
        None
    }

    /// True if the parent chain starting at `start` ever revisits a node.
    pub fn has_cycle(&self, start: &NodeId) -> bool {
        self.find_cycle(start).is_some()
    }

    /// True if `id` itself sits on a parent loop.
    pub fn is_on_cycle(&self, id: &NodeId) -> bool {
        self.find_cycle(id).is_some_and(|members| members.contains(id))
    }

    /// Would making `parent` the parent of `node` close a loop?
    pub fn would_create_cycle(&self, node: &NodeId, parent: &NodeId) -> bool {
        if node == parent {
            return true;
        }
        let (Some(target), Some(start)) = (self.index_of(node), self.index_of(parent)) else {
            return false;
        };
        let mut visited = HashSet::from([start]);
        let mut current = start;
        while let Some(next) = self.parent_index(current) {
            if next == target {
                return true;
            }
            if !visited.insert(next) {
                break;
            }
            current = next;
        }
        false
    }

    /// Assign or clear the parent of `node`. Rejects unknown ids, self-parenting,
    /// cycles and pairings the policy forbids; the graph is untouched on error.
    pub fn assign_parent(
        &mut self,
        node: &NodeId,
        parent: Option<&NodeId>,
        policy: ContainmentPolicy,
    ) -> Result<()> {
        let child_kind = self
            .node(node)
            .map(|n| n.kind)
            .ok_or_else(|| DesignError::UnknownNode(node.clone()))?;

        let Some(parent) = parent else {
            if let Some(n) = self.node_mut(node) {
                n.detach();
            }
            return Ok(());
        };

        let parent_kind = self
            .node(parent)
            .map(|n| n.kind)
            .ok_or_else(|| DesignError::UnknownNode(parent.clone()))?;
        if node == parent {
            return Err(DesignError::SelfParent(node.clone()));
        }
        if self.would_create_cycle(node, parent) {
            return Err(DesignError::WouldCycle {
                node: node.clone(),
                parent: parent.clone(),
            });
        }
        policy.check(parent_kind, child_kind)?;

        if let Some(n) = self.node_mut(node) {
            n.parent_id = Some(parent.clone());
            n.extent = Some(Extent::Parent);
        }
        Ok(())
    }

    /// For every VPC, its direct public/private subnets and each subnet's
    /// direct children. Other children of a VPC are not part of the view.
    pub fn vpc_hierarchy(&self) -> Vec<VpcHierarchy<'_>> {
        let children = self.child_map();
        self.nodes_of_kind(NodeKind::VpcEnvironment)
            .map(|vpc| {
                let mut entry = VpcHierarchy {
                    vpc,
                    public_subnets: Vec::new(),
                    private_subnets: Vec::new(),
                };
                for subnet in children.get(&vpc.id).into_iter().flatten().copied() {
                    let services = children.get(&subnet.id).cloned().unwrap_or_default();
                    let level = SubnetHierarchy { subnet, services };
                    match subnet.kind {
                        NodeKind::PublicSubnet => entry.public_subnets.push(level),
                        NodeKind::PrivateSubnet => entry.private_subnets.push(level),
                        _ => {}
                    }
                }
                entry
            })
            .collect()
    }
}

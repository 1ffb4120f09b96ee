//! Hierarchy building.
//!
//! Links every row of an outline to its parent, rejects cycles, and assigns
//! display orders by a depth-first walk over the sorted forest.

use std::collections::HashMap;

use nonempty::NonEmpty;
use petgraph::{algo::tarjan_scc, graphmap::DiGraphMap};

use crate::{
    domain::node::{NodeId, RequirementNode},
    engine::{
        inference::{CandidateSet, ParentQuery, RuleTable},
        ordering::compare_siblings,
    },
};

/// Errors that abort building the hierarchy of one outline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// The declared parents form a cycle.
    #[error("requirements form a parent cycle: {}", join(.members))]
    Cycle {
        /// Labels of the rows in the cycle, sorted.
        members: NonEmpty<String>,
    },

    /// A declared parent is not part of the outline.
    #[error("requirement {child} declares parent {parent}, which is not in the outline")]
    UnknownParent {
        /// Label of the child row.
        child: String,
        /// The unknown parent id.
        parent: NodeId,
    },
}

fn join(members: &NonEmpty<String>) -> String {
    members.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// A parent link made by inference rather than declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferredLink {
    /// The child row.
    pub child: NodeId,
    /// The inferred parent row.
    pub parent: NodeId,
    /// Name of the rule that matched.
    pub rule: &'static str,
}

/// A fully linked and ordered outline.
#[derive(Debug, Clone)]
pub struct Forest {
    nodes: Vec<RequirementNode>,
    positions: HashMap<NodeId, usize>,
    children: HashMap<NodeId, Vec<NodeId>>,
    roots: Vec<NodeId>,
    orphans: Vec<NodeId>,
    inferred: Vec<InferredLink>,
}

impl Forest {
    /// The rows, in display order.
    #[must_use]
    pub fn nodes(&self) -> &[RequirementNode] {
        &self.nodes
    }

    /// Consume the forest, returning its rows in display order.
    #[must_use]
    pub fn into_nodes(self) -> Vec<RequirementNode> {
        self.nodes
    }

    /// Look up a row.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&RequirementNode> {
        self.positions.get(&id).map(|&position| &self.nodes[position])
    }

    /// The parent row of `id`, if it has one.
    #[must_use]
    pub fn parent_of(&self, id: NodeId) -> Option<&RequirementNode> {
        self.get(id)?.parent().and_then(|parent| self.get(parent))
    }

    /// Children of `id`, in display order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Rows without a parent, in display order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Rows that have no parent but should have one: malformed rows and
    /// nested identifiers whose parent could not be found.
    ///
    /// A parentless base number (`3`) is a root and is not listed here.
    #[must_use]
    pub fn orphans(&self) -> &[NodeId] {
        &self.orphans
    }

    /// Whether `id` is an orphan.
    #[must_use]
    pub fn is_orphan(&self, id: NodeId) -> bool {
        self.orphans.contains(&id)
    }

    /// Links made by inference.
    #[must_use]
    pub fn inferred(&self) -> &[InferredLink] {
        &self.inferred
    }
}

/// Builds a [`Forest`] from the rows of one outline.
#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    rules: RuleTable,
    start: u32,
}

impl Default for HierarchyBuilder {
    fn default() -> Self {
        Self::new(RuleTable::default(), 1)
    }
}

impl HierarchyBuilder {
    /// A builder using `rules` for inference and numbering display orders
    /// from `start`.
    #[must_use]
    pub const fn new(rules: RuleTable, start: u32) -> Self {
        Self { rules, start }
    }

    /// Link, check and order the rows.
    ///
    /// Rows with a declared parent keep it; every other row is offered to
    /// parent inference against the whole outline. Rows nothing matches
    /// become roots.
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::UnknownParent`] if a declared parent is not one of
    ///   the rows
    /// - [`HierarchyError::Cycle`] if the parent links form a cycle
    pub fn build(&self, mut nodes: Vec<RequirementNode>) -> Result<Forest, HierarchyError> {
        let positions: HashMap<NodeId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(position, node)| (node.id, position))
            .collect();

        let unknown = nodes.iter().find_map(|node| {
            node.parent
                .filter(|parent| !positions.contains_key(parent))
                .map(|parent| (node, parent))
        });
        if let Some((node, parent)) = unknown {
            return Err(HierarchyError::UnknownParent {
                child: node.label(),
                parent,
            });
        }

        let mut inferred = Vec::new();
        for (child, parent, rule) in self.infer(&nodes) {
            let link = InferredLink {
                child: nodes[child].id,
                parent: nodes[parent].id,
                rule,
            };
            nodes[child].parent = Some(link.parent);
            inferred.push(link);
        }

        check_cycles(&nodes, &positions)?;

        let order = display_order(&nodes, &positions);
        let mut next = self.start;
        for &position in &order {
            nodes[position].display_order = Some(next);
            next = next.saturating_add(1);
        }

        Ok(arrange(nodes, &order, inferred))
    }

    fn infer(&self, nodes: &[RequirementNode]) -> Vec<(usize, usize, &'static str)> {
        let candidates = CandidateSet::from_nodes(nodes);
        nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent.is_none())
            .filter_map(|(position, _)| {
                let child = candidates.get(position)?;
                let query = ParentQuery {
                    child,
                    own_index: Some(position),
                    current: None,
                };
                let found = self.rules.find_parent(&query, &candidates)?;
                Some((position, found.index, found.rule))
            })
            .collect()
    }
}

/// Positions of the rows in depth-first order over the sorted forest.
fn display_order(nodes: &[RequirementNode], positions: &HashMap<NodeId, usize>) -> Vec<usize> {
    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (position, node) in nodes.iter().enumerate() {
        match node.parent.and_then(|parent| positions.get(&parent)) {
            Some(&parent) => children[parent].push(position),
            None => roots.push(position),
        }
    }

    let by_label = |a: &usize, b: &usize| compare_siblings(&nodes[*a], &nodes[*b]);
    roots.sort_by(by_label);
    for siblings in &mut children {
        siblings.sort_by(by_label);
    }

    let mut order = Vec::with_capacity(nodes.len());
    let mut stack: Vec<usize> = roots.into_iter().rev().collect();
    while let Some(position) = stack.pop() {
        order.push(position);
        stack.extend(children[position].iter().rev());
    }
    order
}

fn check_cycles(
    nodes: &[RequirementNode],
    positions: &HashMap<NodeId, usize>,
) -> Result<(), HierarchyError> {
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::with_capacity(nodes.len(), nodes.len());
    for (position, node) in nodes.iter().enumerate() {
        graph.add_node(position);
        if let Some(&parent) = node.parent.and_then(|parent| positions.get(&parent)) {
            graph.add_edge(position, parent, ());
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| match component.as_slice() {
            [single] => graph.contains_edge(*single, *single),
            _ => true,
        })
        .map(|component| {
            let mut members: Vec<String> = component
                .iter()
                .map(|&position| nodes[position].label())
                .collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();

    match cycles.into_iter().find_map(NonEmpty::from_vec) {
        Some(members) => Err(HierarchyError::Cycle { members }),
        None => Ok(()),
    }
}

fn arrange(nodes: Vec<RequirementNode>, order: &[usize], inferred: Vec<InferredLink>) -> Forest {
    let mut slots: Vec<Option<RequirementNode>> = nodes.into_iter().map(Some).collect();
    let nodes: Vec<RequirementNode> = order
        .iter()
        .filter_map(|&position| slots[position].take())
        .collect();

    let positions: HashMap<NodeId, usize> = nodes
        .iter()
        .enumerate()
        .map(|(position, node)| (node.id, position))
        .collect();

    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut roots = Vec::new();
    let mut orphans = Vec::new();
    for node in &nodes {
        if let Some(parent) = node.parent {
            children.entry(parent).or_default().push(node.id);
            continue;
        }
        roots.push(node.id);
        let nested = node
            .identifier
            .as_ref()
            .is_none_or(|identifier| identifier.parent_identifier().is_some());
        if nested {
            orphans.push(node.id);
        }
    }

    Forest {
        nodes,
        positions,
        children,
        roots,
        orphans,
        inferred,
    }
}

/// Build the hierarchy of an outline with the default rules, numbering
/// display orders from 1.
///
/// # Errors
///
/// See [`HierarchyBuilder::build`].
pub fn build(nodes: Vec<RequirementNode>) -> Result<Forest, HierarchyError> {
    HierarchyBuilder::default().build(nodes)
}

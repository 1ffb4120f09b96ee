//! End-to-end repair of one outline.
//!
//! Takes the rows reported by the scraper for one badge version and produces
//! the rows to persist: canonical identifiers, parent identifiers, display
//! orders and review flags. The steps are:
//!
//! 1. apply the badge's renumbering tables to raw labels
//! 2. parse, keeping malformed rows
//! 3. resolve duplicates and option boundaries
//! 4. bind declared parent labels to rows
//! 5. build the hierarchy
//!
//! Steps 3 and 5 can fail for the outline as a whole; nothing is returned in
//! that case, so the caller has nothing partial to persist.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        Config,
        identifier::Identifier,
        node::{NodeId, Outline, OutlineKey, RequirementNode},
    },
    engine::{
        hierarchy::{HierarchyBuilder, HierarchyError},
        inference::RuleTable,
        resolver::{self, ResolutionError, RewriteKind},
    },
};

/// One row reported by the scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEntry {
    /// The label as scraped.
    pub label: String,

    /// The parent label as scraped, if the scraper knew it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Whether the row has a checkbox. Rows without one are headers.
    #[serde(default = "default_true")]
    pub has_checkbox: bool,

    /// Storage key of an already persisted row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
}

impl InputEntry {
    /// A checkable row with no declared parent.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            parent: None,
            has_checkbox: true,
            id: None,
        }
    }

    /// Set the declared parent label.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Mark the row as a header without a checkbox.
    #[must_use]
    pub const fn without_checkbox(mut self) -> Self {
        self.has_checkbox = false;
        self
    }
}

const fn default_true() -> bool {
    true
}

/// All rows the scraper reported for one badge version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineInput {
    /// Badge name.
    pub badge: String,

    /// Requirements version (usually a year).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// The rows, in scraped order.
    pub requirements: Vec<InputEntry>,
}

impl OutlineInput {
    /// The outline's key.
    #[must_use]
    pub fn key(&self) -> OutlineKey {
        OutlineKey::new(self.badge.clone(), self.version.clone())
    }

    /// Renumber and parse every row.
    ///
    /// Renumbered labels are reported as findings; parse failures are kept on
    /// their rows.
    #[must_use]
    pub fn to_outline(&self, config: &Config) -> (Outline, Vec<Finding>) {
        let key = self.key();
        let mut findings = Vec::new();

        let nodes = self
            .requirements
            .iter()
            .map(|entry| {
                let label = match config.renumber(&key, &entry.label) {
                    Some(to) => {
                        findings.push(Finding::Renumbered {
                            from: entry.label.clone(),
                            to: to.clone(),
                        });
                        to
                    }
                    None => entry.label.clone(),
                };

                let id = entry.id.unwrap_or_else(NodeId::fresh);
                let node = RequirementNode::with_grammar(id, label, config.grammar())
                    .header(!entry.has_checkbox);

                match entry.parent.as_deref().map(str::trim) {
                    Some(parent) if !parent.is_empty() => {
                        let parent = config
                            .renumber(&key, parent)
                            .unwrap_or_else(|| parent.to_string());
                        node.with_declared_parent_label(parent)
                    }
                    _ => node,
                }
            })
            .collect::<Vec<_>>();

        findings.extend(nodes.iter().filter_map(|node| {
            node.parse_error().map(|_| Finding::Malformed {
                label: node.raw_label().to_string(),
            })
        }));

        (Outline::new(key, nodes), findings)
    }
}

/// Something about the repair a reviewer should know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Finding {
    /// A label matched neither grammar and was kept as scraped.
    Malformed {
        /// The raw label.
        label: String,
    },
    /// A label was replaced from the badge's renumbering table.
    Renumbered {
        /// The scraped label.
        from: String,
        /// The replacement.
        to: String,
    },
    /// An identifier was moved into an option branch.
    OptionSplit {
        /// The identifier before the rewrite.
        from: String,
        /// The identifier after the rewrite.
        to: String,
    },
    /// A duplicate identifier was given a `_N` suffix.
    Disambiguated {
        /// The identifier before the rewrite.
        from: String,
        /// The identifier after the rewrite.
        to: String,
    },
    /// A declared parent label matched no row, so the parent was inferred.
    UnboundParent {
        /// The child row.
        label: String,
        /// The declared parent label.
        parent: String,
    },
    /// A row has no parent but looks like it should.
    Orphan {
        /// The row.
        label: String,
    },
}

impl Finding {
    /// Whether the finding marks a row for manual review.
    #[must_use]
    pub const fn needs_review(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. } | Self::Disambiguated { .. } | Self::Orphan { .. }
        )
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { label } => write!(f, "malformed label '{label}'"),
            Self::Renumbered { from, to } => write!(f, "renumbered {from} to {to}"),
            Self::OptionSplit { from, to } => write!(f, "moved {from} to option {to}"),
            Self::Disambiguated { from, to } => write!(f, "duplicate {from} renamed {to}"),
            Self::UnboundParent { label, parent } => {
                write!(f, "{label}: declared parent '{parent}' not found")
            }
            Self::Orphan { label } => write!(f, "{label} has no parent"),
        }
    }
}

/// One repaired row, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    /// Canonical identifier, or the raw label if it could not be parsed.
    pub identifier: String,

    /// Canonical identifier of the parent row.
    pub parent_identifier: Option<String>,

    /// Position in depth-first order.
    pub display_order: u32,

    /// Whether a human should check this row.
    pub needs_review: bool,

    /// Whether the row is a header without a checkbox.
    pub is_header: bool,

    /// The label as scraped.
    pub raw_label: String,

    /// Storage key of the row.
    pub id: NodeId,
}

/// The result of repairing one outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// The outline's key.
    #[serde(flatten)]
    pub key: OutlineKey,

    /// Repaired rows, in display order.
    pub rows: Vec<OutputRow>,

    /// Everything worth reporting, in pipeline order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

impl RepairReport {
    /// Rows flagged for review.
    pub fn needs_review(&self) -> impl Iterator<Item = &OutputRow> {
        self.rows.iter().filter(|row| row.needs_review)
    }

    /// Whether no row needs review.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.needs_review().next().is_none()
    }

    /// Find a row by its identifier.
    #[must_use]
    pub fn row(&self, identifier: &str) -> Option<&OutputRow> {
        self.rows.iter().find(|row| row.identifier == identifier)
    }
}

/// Errors that abort the repair of one outline.
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    /// Duplicates could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The hierarchy could not be built.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

/// The inference rules selected by the configuration.
#[must_use]
pub fn rules_for(config: &Config) -> RuleTable {
    if config.named_option_rule {
        RuleTable::default()
    } else {
        RuleTable::without_named_options()
    }
}

/// Repair one outline.
///
/// # Errors
///
/// Returns an error if duplicates cannot be resolved or the declared parents
/// form a cycle.
pub fn repair(input: &OutlineInput, config: &Config) -> Result<RepairReport, RepairError> {
    let (outline, findings) = input.to_outline(config);
    repair_outline(outline, config, findings)
}

/// Repair an already parsed outline, appending to `findings`.
///
/// # Errors
///
/// See [`repair`].
pub fn repair_outline(
    outline: Outline,
    config: &Config,
    mut findings: Vec<Finding>,
) -> Result<RepairReport, RepairError> {
    let (key, nodes) = outline.into_parts();

    let resolved = resolver::resolve(nodes)?;
    findings.extend(resolved.rewrites().iter().map(|rewrite| {
        let (from, to) = (rewrite.from.to_string(), rewrite.to.to_string());
        match rewrite.kind {
            RewriteKind::OptionSplit => Finding::OptionSplit { from, to },
            RewriteKind::Disambiguated => Finding::Disambiguated { from, to },
        }
    }));
    findings.extend(
        resolved
            .relabels()
            .iter()
            .map(|relabel| Finding::Disambiguated {
                from: relabel.raw_label.clone(),
                to: relabel.label.clone(),
            }),
    );

    let mut nodes = resolved.into_nodes();
    findings.extend(bind_declared_parents(&mut nodes, config));

    let forest =
        HierarchyBuilder::new(rules_for(config), config.display_order_start()).build(nodes)?;

    findings.extend(forest.orphans().iter().filter_map(|&id| {
        forest.get(id).map(|node| Finding::Orphan {
            label: node.label(),
        })
    }));

    let rows = forest
        .nodes()
        .iter()
        .map(|node| OutputRow {
            identifier: node.label(),
            parent_identifier: forest.parent_of(node.id()).map(RequirementNode::label),
            display_order: node.display_order().unwrap_or_default(),
            needs_review: node.identifier().is_none_or(Identifier::needs_review)
                || forest.is_orphan(node.id()),
            is_header: node.is_header(),
            raw_label: node.raw_label().to_string(),
            id: node.id(),
        })
        .collect();

    Ok(RepairReport {
        key,
        rows,
        findings,
    })
}

/// Turn declared parent labels into parent links.
///
/// A label binds to the row whose identifier matches it, ignoring
/// disambiguation suffixes; among several such rows the one whose suffix
/// agrees with the child's wins. Labels that are not identifiers bind to the
/// row with that output label, or else the first row with that raw text.
/// Labels that match nothing are reported and left to inference.
fn bind_declared_parents(nodes: &mut [RequirementNode], config: &Config) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut links = Vec::new();

    for (position, node) in nodes.iter().enumerate() {
        let Some(label) = node.declared_parent_label() else {
            continue;
        };
        if node.parent().is_some() {
            continue;
        }

        let target = Identifier::parse_with(label, config.grammar()).map_or_else(
            |_| {
                nodes
                    .iter()
                    .position(|candidate| candidate.label() == label)
                    .or_else(|| {
                        nodes
                            .iter()
                            .position(|candidate| candidate.raw_label().trim() == label)
                    })
            },
            |parent| matching_parent(nodes, &parent, node),
        );

        match target.filter(|&target| target != position) {
            Some(target) => links.push((position, nodes[target].id())),
            None => findings.push(Finding::UnboundParent {
                label: node.label(),
                parent: label.to_string(),
            }),
        }
    }

    for (position, parent) in links {
        nodes[position].parent = Some(parent);
    }
    findings
}

fn matching_parent(
    nodes: &[RequirementNode],
    parent: &Identifier,
    child: &RequirementNode,
) -> Option<usize> {
    let wanted = parent.without_disambiguator();
    let child_suffix = child.identifier().and_then(Identifier::disambiguator);
    let matches: Vec<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, candidate)| {
            candidate
                .identifier()
                .is_some_and(|id| id.without_disambiguator() == wanted)
        })
        .map(|(position, _)| position)
        .collect();

    match matches.as_slice() {
        [] => None,
        [only] => Some(*only),
        several => several
            .iter()
            .copied()
            .find(|&position| {
                nodes[position].identifier().and_then(Identifier::disambiguator)
                    == parent.disambiguator().or(child_suffix)
            })
            .or_else(|| several.first().copied()),
    }
}

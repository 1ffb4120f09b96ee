//! Duplicate and option-boundary resolution.
//!
//! The scraper walks a rendered outline top to bottom and cannot tell when it
//! has crossed from one option's content into the next, so the same
//! identifier can appear more than once in a flat outline. The resolver
//! rewrites such outlines so that every identifier is unique:
//!
//! 1. The shallowest repeating identifier is taken as the boundary marker.
//!    Each of its occurrences opens a new option, and every row sharing the
//!    marker's base number is moved into the current option (`2a` becomes
//!    `2Aa`, then `2Ba` after the next boundary).
//! 2. Whatever still repeats gets a positional `_N` suffix on every
//!    occurrence after the first.
//! 3. Malformed rows whose raw labels repeat get the same kind of suffix on
//!    their output label.
//!
//! Option letters sit directly after the base number, so a marker nested
//! under an item that is present in the outline (`3a(1)` below a single
//! `3a`) is a repeated leaf rather than an option boundary; such outlines
//! fall back to suffixes.
//!
//! Resolving an outline without duplicates changes nothing.

use std::{
    collections::{HashMap, HashSet},
    num::NonZeroU32,
};

use nonempty::NonEmpty;

use crate::domain::{
    identifier::Identifier,
    node::{NodeId, RequirementNode},
};

/// The resolver could not make every identifier unique.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// Identifiers that still occur more than once after resolution.
    #[error("duplicate identifiers remain after resolution: {}", join(.identifiers))]
    UnresolvedDuplicates {
        /// The repeated identifiers, in canonical form.
        identifiers: NonEmpty<String>,
    },
}

fn join(identifiers: &NonEmpty<String>) -> String {
    identifiers.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// Why the resolver replaced an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteKind {
    /// Moved into an option branch detected from the boundary marker.
    OptionSplit,
    /// Given a `_N` suffix because no structural fix was found.
    Disambiguated,
}

/// A single identifier replacement made by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// The row that was rewritten.
    pub node: NodeId,
    /// The identifier before the rewrite.
    pub from: Identifier,
    /// The identifier after the rewrite.
    pub to: Identifier,
    /// Which step made the rewrite.
    pub kind: RewriteKind,
}

/// The output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutline {
    nodes: Vec<RequirementNode>,
    boundary: Option<Identifier>,
    rewrites: Vec<Rewrite>,
    relabels: Vec<Relabel>,
}

/// A malformed row whose repeated raw label was given a positional suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relabel {
    /// The row that was relabelled.
    pub node: NodeId,
    /// The label as loaded.
    pub raw_label: String,
    /// The label used in output.
    pub label: String,
}

impl ResolvedOutline {
    /// The rows, in their original order.
    #[must_use]
    pub fn nodes(&self) -> &[RequirementNode] {
        &self.nodes
    }

    /// Consume the outline, returning its rows.
    #[must_use]
    pub fn into_nodes(self) -> Vec<RequirementNode> {
        self.nodes
    }

    /// The boundary marker used to split options, if one was found.
    #[must_use]
    pub const fn boundary(&self) -> Option<&Identifier> {
        self.boundary.as_ref()
    }

    /// Every rewrite, in the order it was made.
    #[must_use]
    pub fn rewrites(&self) -> &[Rewrite] {
        &self.rewrites
    }

    /// Malformed rows given a positional suffix.
    #[must_use]
    pub fn relabels(&self) -> &[Relabel] {
        &self.relabels
    }

    /// Whether resolution left the outline untouched.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.rewrites.is_empty() && self.relabels.is_empty()
    }
}

/// Make every identifier in an outline unique.
///
/// Rows that failed to parse keep their identifier-less state; repeats among
/// them are told apart by a suffix on their output label. Rewritten rows
/// lose any declared parent, which referred to the ambiguous identifier, and
/// are left for parent inference.
///
/// # Errors
///
/// Returns [`ResolutionError::UnresolvedDuplicates`] if duplicates remain.
pub fn resolve(mut nodes: Vec<RequirementNode>) -> Result<ResolvedOutline, ResolutionError> {
    let mut rewrites = Vec::new();

    let boundary = boundary_marker(&nodes);
    if let Some(marker) = &boundary {
        split_options(&mut nodes, marker, &mut rewrites);
    }
    disambiguate(&mut nodes, &mut rewrites);
    let relabels = disambiguate_malformed(&mut nodes);
    ensure_unique(&nodes)?;

    Ok(ResolvedOutline {
        nodes,
        boundary,
        rewrites,
        relabels,
    })
}

/// Identifiers that occur more than once, in order of first occurrence.
fn repeaters(nodes: &[RequirementNode]) -> Vec<Identifier> {
    let mut counts: HashMap<&Identifier, usize> = HashMap::new();
    let mut order = Vec::new();
    for identifier in nodes.iter().filter_map(RequirementNode::identifier) {
        let count = counts.entry(identifier).or_default();
        *count += 1;
        if *count == 2 {
            order.push(identifier.clone());
        }
    }
    order.sort_by_key(|identifier| {
        nodes
            .iter()
            .position(|node| node.identifier() == Some(identifier))
    });
    order
}

/// The shallowest repeater, if it can carry an option letter.
fn boundary_marker(nodes: &[RequirementNode]) -> Option<Identifier> {
    let repeaters = repeaters(nodes);
    // min_by_key keeps the first of equally shallow repeaters
    let shallowest = repeaters.iter().min_by_key(|id| id.nesting_depth())?;
    if shallowest.is_option_variant() || shallowest.needs_review() {
        return None;
    }

    let present: HashSet<&Identifier> = nodes
        .iter()
        .filter_map(RequirementNode::identifier)
        .collect();
    let nested_under_present = shallowest
        .ancestors()
        .filter(|ancestor| ancestor.nesting_depth() > 0)
        .any(|ancestor| present.contains(&ancestor));
    if nested_under_present {
        return None;
    }
    Some(shallowest.clone())
}

fn option_letter(index: usize) -> Option<char> {
    u8::try_from(index)
        .ok()
        .filter(|index| *index < 26)
        .map(|index| char::from(b'A' + index))
}

/// The state threaded through the forward walk of [`split_options`].
#[derive(Debug, Clone, Default)]
struct WalkState {
    /// Zero-based index of the option being walked, once the first boundary
    /// has been passed.
    current_option: Option<usize>,
    /// The lettered item most recently opened in the current option.
    open_letter: Option<Identifier>,
}

impl WalkState {
    /// Visit one identifier, returning the next state and the replacement
    /// identifier, if any.
    fn advance(self, marker: &Identifier, identifier: &Identifier) -> (Self, Option<Identifier>) {
        let at_boundary = identifier == marker;
        let current_option = if at_boundary {
            Some(self.current_option.map_or(0, |option| option + 1))
        } else {
            self.current_option
        };
        let open_letter = if at_boundary { None } else { self.open_letter };

        let letter = current_option.and_then(option_letter);
        let rewritten = match letter {
            Some(letter)
                if identifier.base_number() == marker.base_number()
                    && !identifier.is_option_variant() =>
            {
                match (identifier.components(), &open_letter) {
                    ([first, ..], Some(open)) if first.is_index() => {
                        Some(open.extended(identifier.components(), identifier.disambiguator()))
                    }
                    _ => identifier.with_option_letter(letter),
                }
            }
            _ => None,
        };

        let open_letter = match rewritten.as_ref().map(Identifier::components) {
            Some([]) => None,
            Some([component]) if component.is_letter() => rewritten
                .as_ref()
                .map(Identifier::without_disambiguator),
            _ => open_letter,
        };

        (
            Self {
                current_option,
                open_letter,
            },
            rewritten,
        )
    }
}

fn split_options(nodes: &mut [RequirementNode], marker: &Identifier, rewrites: &mut Vec<Rewrite>) {
    let mut state = WalkState::default();

    for node in nodes.iter_mut() {
        let Some(identifier) = node.identifier.clone() else {
            continue;
        };
        let (next, rewritten) = state.advance(marker, &identifier);
        state = next;

        if let Some(to) = rewritten {
            node.replace_identifier(to.clone());
            node.parent = None;
            node.declared_parent_label = None;
            rewrites.push(Rewrite {
                node: node.id,
                from: identifier,
                to,
                kind: RewriteKind::OptionSplit,
            });
        }
    }
}

fn disambiguate(nodes: &mut [RequirementNode], rewrites: &mut Vec<Rewrite>) {
    let mut taken: HashSet<Identifier> = nodes
        .iter()
        .filter_map(|node| node.identifier.clone())
        .collect();
    let mut seen: HashMap<Identifier, u32> = HashMap::new();

    for node in nodes.iter_mut() {
        let Some(identifier) = node.identifier.clone() else {
            continue;
        };
        let occurrence = seen.entry(identifier.clone()).or_default();
        *occurrence += 1;
        if *occurrence == 1 {
            continue;
        }

        let plain = identifier.without_disambiguator();
        let start = occurrence.saturating_add(identifier.disambiguator().map_or(0, |n| n.get() - 1));
        let first_free = (start..=u32::MAX)
            .filter_map(NonZeroU32::new)
            .map(|suffix| plain.with_disambiguator(suffix))
            .find(|candidate| !taken.contains(candidate));
        let Some(to) = first_free else {
            continue;
        };

        taken.insert(to.clone());
        node.replace_identifier(to.clone());
        rewrites.push(Rewrite {
            node: node.id,
            from: identifier,
            to,
            kind: RewriteKind::Disambiguated,
        });
    }
}

/// Suffix repeated malformed labels so that every output label is unique.
///
/// Suffixes are recomputed from scratch, so resolving the output again
/// assigns the same ones and reports nothing.
fn disambiguate_malformed(nodes: &mut [RequirementNode]) -> Vec<Relabel> {
    let previous: Vec<Option<NonZeroU32>> =
        nodes.iter().map(|node| node.label_suffix).collect();
    for node in &mut *nodes {
        node.label_suffix = None;
    }

    let mut taken: HashSet<String> = nodes.iter().map(RequirementNode::label).collect();
    let mut seen: HashMap<String, u32> = HashMap::new();
    let mut relabels = Vec::new();

    for (node, previous) in nodes.iter_mut().zip(previous) {
        if node.identifier.is_some() {
            continue;
        }
        let occurrence = seen.entry(node.raw_label.clone()).or_default();
        *occurrence += 1;
        if *occurrence == 1 {
            continue;
        }

        let first_free = (*occurrence..=u32::MAX)
            .filter_map(NonZeroU32::new)
            .map(|suffix| (suffix, format!("{}_{suffix}", node.raw_label)))
            .find(|(_, candidate)| !taken.contains(candidate));
        let Some((suffix, label)) = first_free else {
            continue;
        };

        taken.insert(label.clone());
        node.label_suffix = Some(suffix);
        if previous != Some(suffix) {
            relabels.push(Relabel {
                node: node.id,
                raw_label: node.raw_label.clone(),
                label,
            });
        }
    }
    relabels
}

/// Fail with every identifier or output label that still repeats.
fn ensure_unique(nodes: &[RequirementNode]) -> Result<(), ResolutionError> {
    let mut remaining: Vec<String> = repeaters(nodes)
        .iter()
        .map(Identifier::to_string)
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in nodes.iter().map(RequirementNode::label) {
        let count = counts.entry(label.clone()).or_default();
        *count += 1;
        if *count == 2 && !remaining.contains(&label) {
            remaining.push(label);
        }
    }

    match NonEmpty::from_vec(remaining) {
        Some(identifiers) => Err(ResolutionError::UnresolvedDuplicates { identifiers }),
        None => Ok(()),
    }
}

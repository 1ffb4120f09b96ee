use std::{fmt, num::NonZeroU32};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::identifier::{Grammar, Identifier, ParseError};

/// Opaque handle for a requirement row within a repair run.
///
/// For rows that are already persisted this is the storage key; newly
/// discovered rows get a fresh random id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a fresh id for a row that has no storage key yet.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing storage key.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying storage key.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for NodeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A requirement row in the working set being repaired.
///
/// The identifier is replaced (never edited) when the resolver rewrites it;
/// the raw label the row was loaded with is always kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementNode {
    pub(crate) id: NodeId,
    pub(crate) identifier: Option<Identifier>,
    pub(crate) parse_error: Option<ParseError>,
    pub(crate) raw_label: String,
    pub(crate) label_suffix: Option<NonZeroU32>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) declared_parent_label: Option<String>,
    pub(crate) display_order: Option<u32>,
    pub(crate) is_header: bool,
}

impl RequirementNode {
    /// Load a row from its raw label, accepting canonical and legacy shapes.
    ///
    /// A fresh id is generated. Labels that fail to parse are kept with their
    /// error; see [`RequirementNode::parse_error`].
    #[must_use]
    pub fn new(raw_label: impl Into<String>) -> Self {
        Self::with_grammar(NodeId::fresh(), raw_label, Grammar::CanonicalOrLegacy)
    }

    /// Load a row with a known id, using the given grammar.
    #[must_use]
    pub fn with_grammar(id: NodeId, raw_label: impl Into<String>, grammar: Grammar) -> Self {
        let raw_label = raw_label.into();
        let (identifier, parse_error) = match Identifier::parse_with(&raw_label, grammar) {
            Ok(identifier) => (Some(identifier), None),
            Err(e) => (None, Some(e)),
        };

        Self {
            id,
            identifier,
            parse_error,
            raw_label,
            label_suffix: None,
            parent: None,
            declared_parent_label: None,
            display_order: None,
            is_header: false,
        }
    }

    /// Set the id.
    #[must_use]
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Set the declared parent.
    #[must_use]
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Record the parent label reported by the scraper.
    ///
    /// The label is bound to a node id once duplicates have been resolved.
    #[must_use]
    pub fn with_declared_parent_label(mut self, label: impl Into<String>) -> Self {
        self.declared_parent_label = Some(label.into());
        self
    }

    /// Mark the row as a grouping header.
    #[must_use]
    pub fn header(mut self, is_header: bool) -> Self {
        self.is_header = is_header;
        self
    }

    /// The row's id.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// The parsed identifier, or `None` if the raw label was malformed.
    #[must_use]
    pub const fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    /// Why the raw label could not be parsed, if it could not.
    #[must_use]
    pub const fn parse_error(&self) -> Option<&ParseError> {
        self.parse_error.as_ref()
    }

    /// The label the row was loaded with.
    #[must_use]
    pub fn raw_label(&self) -> &str {
        &self.raw_label
    }

    /// The parent row, if linked.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The parent label reported by the scraper, if not yet bound.
    #[must_use]
    pub fn declared_parent_label(&self) -> Option<&str> {
        self.declared_parent_label.as_deref()
    }

    /// Position in depth-first order, once the hierarchy has been built.
    #[must_use]
    pub const fn display_order(&self) -> Option<u32> {
        self.display_order
    }

    /// Whether the row is a grouping header without checkable content.
    #[must_use]
    pub const fn is_header(&self) -> bool {
        self.is_header
    }

    /// The positional suffix given to a malformed row whose raw label repeats.
    #[must_use]
    pub const fn label_suffix(&self) -> Option<NonZeroU32> {
        self.label_suffix
    }

    /// The label used in output: the canonical identifier, or the raw label
    /// when parsing failed.
    ///
    /// Repeated malformed labels carry their positional suffix (`junk_2`).
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.identifier, self.label_suffix) {
            (Some(identifier), _) => identifier.to_string(),
            (None, Some(suffix)) => format!("{}_{suffix}", self.raw_label),
            (None, None) => self.raw_label.clone(),
        }
    }

    /// Replace the identifier, returning the previous one.
    pub(crate) fn replace_identifier(&mut self, identifier: Identifier) -> Option<Identifier> {
        self.identifier.replace(identifier)
    }
}

/// The (badge, version) pair an outline belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutlineKey {
    /// Badge name.
    pub badge: String,
    /// Requirements version (usually a year).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl OutlineKey {
    /// Create a key.
    #[must_use]
    pub fn new(badge: impl Into<String>, version: Option<String>) -> Self {
        Self {
            badge: badge.into(),
            version,
        }
    }
}

impl fmt::Display for OutlineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} ({version})", self.badge),
            None => write!(f, "{}", self.badge),
        }
    }
}

/// All requirement rows for one badge version, in scraped order.
///
/// This is the unit of work: resolution never looks across outlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    key: OutlineKey,
    nodes: Vec<RequirementNode>,
}

impl Outline {
    /// Create an outline from its rows.
    #[must_use]
    pub const fn new(key: OutlineKey, nodes: Vec<RequirementNode>) -> Self {
        Self { key, nodes }
    }

    /// The outline's key.
    #[must_use]
    pub const fn key(&self) -> &OutlineKey {
        &self.key
    }

    /// The rows, in their current order.
    #[must_use]
    pub fn nodes(&self) -> &[RequirementNode] {
        &self.nodes
    }

    /// Consume the outline, returning its key and rows.
    #[must_use]
    pub fn into_parts(self) -> (OutlineKey, Vec<RequirementNode>) {
        (self.key, self.nodes)
    }

    /// Rows whose label could not be parsed.
    pub fn malformed(&self) -> impl Iterator<Item = &RequirementNode> {
        self.nodes.iter().filter(|node| node.identifier.is_none())
    }

    /// Find the row carrying `identifier`.
    #[must_use]
    pub fn find(&self, identifier: &Identifier) -> Option<&RequirementNode> {
        self.nodes
            .iter()
            .find(|node| node.identifier.as_ref() == Some(identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_label_is_retained() {
        let node = RequirementNode::new("4(e)_weird!");
        assert!(node.identifier().is_none());
        assert!(matches!(node.parse_error(), Some(ParseError::Malformed(_))));
        assert_eq!(node.raw_label(), "4(e)_weird!");
        assert_eq!(node.label(), "4(e)_weird!");
    }

    #[test]
    fn label_is_canonical() {
        let node = RequirementNode::new("9b2");
        assert_eq!(node.label(), "9b(2)");
        assert_eq!(node.raw_label(), "9b2");
    }

    #[test]
    fn canonical_grammar_rejects_legacy_label() {
        let node = RequirementNode::with_grammar(NodeId::fresh(), "9b2", Grammar::Canonical);
        assert!(node.identifier().is_none());
    }

    #[test]
    fn outline_lookup() {
        let outline = Outline::new(
            OutlineKey::new("Cooking", Some("2024".to_string())),
            vec![RequirementNode::new("1"), RequirementNode::new("1 a!")],
        );
        assert_eq!(outline.key().to_string(), "Cooking (2024)");
        assert!(outline.find(&"1".parse().unwrap()).is_some());
        assert_eq!(outline.malformed().count(), 1);
    }
}

//! Parent inference.
//!
//! Deciding whether one requirement is the direct parent of another is done by
//! an ordered [`RuleTable`]. Each rule is a predicate paired with a
//! specificity rank; for a given (parent, child) pair the first rule in table
//! order that matches decides, and when several candidate parents match the
//! highest-ranked, deepest one is chosen.
//!
//! The default table holds three rules, in priority order:
//!
//! 1. [`STRUCTURAL_PARENT`]: the child minus its last level is the candidate
//!    (`1 -> 1a`, `6A -> 6A(a)`, `6A(a) -> 6A(a)(1)`).
//! 2. [`SKIP_LEVEL`]: the candidate is the child's grandparent and the
//!    intermediate level is absent from the outline.
//! 3. [`NAMED_OPTION`]: the child's raw label is the candidate's base number
//!    followed by a letter and a free-text name (`6a beef`).

use std::{cmp::Ordering, collections::HashSet, sync::LazyLock};

use regex::Regex;

use crate::domain::{identifier::Identifier, node::RequirementNode};

/// One participant in parent inference.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// The parsed identifier, or `None` for malformed labels.
    pub identifier: Option<&'a Identifier>,
    /// The label as scraped.
    pub raw_label: &'a str,
    /// Whether the row is a grouping header.
    pub is_header: bool,
}

impl<'a> Candidate<'a> {
    /// A candidate for an identifier with the given raw label.
    #[must_use]
    pub const fn parsed(identifier: &'a Identifier, raw_label: &'a str) -> Self {
        Self {
            identifier: Some(identifier),
            raw_label,
            is_header: false,
        }
    }

    /// A candidate for a requirement row.
    #[must_use]
    pub fn from_node(node: &'a RequirementNode) -> Self {
        Self {
            identifier: node.identifier.as_ref(),
            raw_label: node.raw_label.as_str(),
            is_header: node.is_header,
        }
    }
}

/// The candidate parents of one outline.
#[derive(Debug, Clone)]
pub struct CandidateSet<'a> {
    entries: Vec<Candidate<'a>>,
    present: HashSet<Identifier>,
}

impl<'a> CandidateSet<'a> {
    /// Build a candidate set.
    #[must_use]
    pub fn new(entries: Vec<Candidate<'a>>) -> Self {
        let present = entries
            .iter()
            .filter_map(|candidate| candidate.identifier)
            .map(Identifier::without_disambiguator)
            .collect();
        Self { entries, present }
    }

    /// Build a candidate set from the rows of an outline.
    #[must_use]
    pub fn from_nodes(nodes: &'a [RequirementNode]) -> Self {
        Self::new(nodes.iter().map(Candidate::from_node).collect())
    }

    /// Whether some candidate has this identifier, ignoring disambiguation
    /// suffixes.
    #[must_use]
    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.present.contains(&identifier.without_disambiguator())
    }

    /// The candidate at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Candidate<'a>> {
        self.entries.get(index)
    }

    /// Iterate over the candidates in outline order.
    pub fn iter(&self) -> impl Iterator<Item = &Candidate<'a>> {
        self.entries.iter()
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The pair under test, with the outline it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct Probe<'p, 'a> {
    /// The prospective parent.
    pub parent: &'p Candidate<'a>,
    /// The prospective child.
    pub child: &'p Candidate<'a>,
    /// Every candidate in the outline.
    pub candidates: &'p CandidateSet<'a>,
}

impl Probe<'_, '_> {
    fn identifiers(&self) -> Option<(&Identifier, &Identifier)> {
        self.parent.identifier.zip(self.child.identifier)
    }
}

/// A parent inference rule.
#[derive(Debug, Clone, Copy)]
pub struct InferenceRule {
    /// Short name, reported alongside inferred links.
    pub name: &'static str,
    /// Specificity; a match under a higher rank beats any match under a lower
    /// one.
    pub rank: u8,
    /// Whether `probe.parent` is the direct parent of `probe.child`.
    pub predicate: fn(&Probe<'_, '_>) -> bool,
}

/// `child` minus its last level equals `parent`.
pub const STRUCTURAL_PARENT: InferenceRule = InferenceRule {
    name: "structural-parent",
    rank: 30,
    predicate: structural_parent,
};

/// `parent` is the grandparent of `child` and the level in between is missing
/// from the outline.
pub const SKIP_LEVEL: InferenceRule = InferenceRule {
    name: "skip-level",
    rank: 20,
    predicate: skip_level,
};

/// `child` is a free-text named option (`6a beef`) of the base number
/// `parent`.
pub const NAMED_OPTION: InferenceRule = InferenceRule {
    name: "named-option",
    rank: 10,
    predicate: named_option,
};

fn structural_parent(probe: &Probe<'_, '_>) -> bool {
    let Some((parent, child)) = probe.identifiers() else {
        return false;
    };
    child
        .parent_identifier()
        .is_some_and(|structural| structural == parent.without_disambiguator())
}

fn skip_level(probe: &Probe<'_, '_>) -> bool {
    let Some((parent, child)) = probe.identifiers() else {
        return false;
    };
    let Some(intermediate) = child.parent_identifier() else {
        return false;
    };
    intermediate
        .parent_identifier()
        .is_some_and(|grandparent| grandparent == parent.without_disambiguator())
        && !probe.candidates.contains(&intermediate)
}

static NAMED_OPTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+) ?[a-z]\s+[A-Za-z]").expect("named option pattern is valid")
});

fn named_option(probe: &Probe<'_, '_>) -> bool {
    let Some(parent) = probe.parent.identifier else {
        return false;
    };
    if parent.nesting_depth() != 0 || parent.needs_review() {
        return false;
    }
    NAMED_OPTION_LABEL
        .captures(probe.child.raw_label)
        .and_then(|captures| captures[1].parse::<u32>().ok())
        .is_some_and(|base| base == parent.base_number().get())
}

/// The rule that linked a child to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentMatch {
    /// Index of the parent in the candidate set.
    pub index: usize,
    /// Name of the matching rule.
    pub rule: &'static str,
    /// Rank of the matching rule.
    pub rank: u8,
}

/// A child looking for its parent.
#[derive(Debug, Clone, Copy)]
pub struct ParentQuery<'p, 'a> {
    /// The child.
    pub child: &'p Candidate<'a>,
    /// The child's own index in the candidate set, if it is a member.
    pub own_index: Option<usize>,
    /// Index of the child's currently recorded parent, preferred on ties.
    pub current: Option<usize>,
}

/// An ordered list of inference rules.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<InferenceRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new(vec![STRUCTURAL_PARENT, SKIP_LEVEL, NAMED_OPTION])
    }
}

impl RuleTable {
    /// A table evaluating `rules` in the given order.
    #[must_use]
    pub const fn new(rules: Vec<InferenceRule>) -> Self {
        Self { rules }
    }

    /// The default table without the named-option rule.
    #[must_use]
    pub fn without_named_options() -> Self {
        Self::new(vec![STRUCTURAL_PARENT, SKIP_LEVEL])
    }

    /// Append a rule, evaluated after all existing ones.
    pub fn push(&mut self, rule: InferenceRule) {
        self.rules.push(rule);
    }

    /// The rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[InferenceRule] {
        &self.rules
    }

    /// The first rule, in table order, under which `probe.parent` is the
    /// direct parent of `probe.child`.
    #[must_use]
    pub fn first_match(&self, probe: &Probe<'_, '_>) -> Option<&InferenceRule> {
        self.rules.iter().find(|rule| (rule.predicate)(probe))
    }

    /// Find the direct parent of `query.child` among `candidates`.
    ///
    /// Among matching candidates the winner is, in order of precedence: the
    /// one matched by the highest-ranked rule; the deepest; the one whose
    /// disambiguation suffix agrees with the child's; the current parent; a
    /// header; the earliest in outline order.
    #[must_use]
    pub fn find_parent(
        &self,
        query: &ParentQuery<'_, '_>,
        candidates: &CandidateSet<'_>,
    ) -> Option<ParentMatch> {
        let mut best: Option<(Score, ParentMatch)> = None;

        for (index, parent) in candidates.iter().enumerate() {
            if Some(index) == query.own_index {
                continue;
            }
            let probe = Probe {
                parent,
                child: query.child,
                candidates,
            };
            let Some(rule) = self.first_match(&probe) else {
                continue;
            };

            let score = Score {
                rank: rule.rank,
                depth: parent.identifier.map_or(0, Identifier::nesting_depth),
                suffix_agrees: parent.identifier.map(Identifier::disambiguator)
                    == query.child.identifier.map(Identifier::disambiguator),
                is_current: query.current == Some(index),
                is_header: parent.is_header,
            };
            let found = ParentMatch {
                index,
                rule: rule.name,
                rank: rule.rank,
            };

            // strictly greater keeps the earliest candidate on full ties
            if best
                .as_ref()
                .is_none_or(|(best_score, _)| score.cmp(best_score) == Ordering::Greater)
            {
                best = Some((score, found));
            }
        }

        best.map(|(_, found)| found)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    rank: u8,
    depth: usize,
    suffix_agrees: bool,
    is_current: bool,
    is_header: bool,
}

/// Whether `candidate_parent` is the direct parent of `child` under the
/// default rules, when no other requirement of the outline is known.
#[must_use]
pub fn is_direct_child(candidate_parent: &Identifier, child: &Identifier) -> bool {
    let parent_label = candidate_parent.to_string();
    let child_label = child.to_string();
    let parent = Candidate::parsed(candidate_parent, &parent_label);
    let child = Candidate::parsed(child, &child_label);
    let candidates = CandidateSet::new(vec![parent]);

    RuleTable::default()
        .first_match(&Probe {
            parent: &parent,
            child: &child,
            candidates: &candidates,
        })
        .is_some()
}

/// Find the direct parent of `child` among `candidates` under the default
/// rules.
///
/// `current` is the parent already recorded for `child`, if any; it wins ties
/// so that re-running inference on a correct outline changes nothing.
/// Returns `None` when no candidate matches: the child is an orphan.
#[must_use]
pub fn find_direct_parent<'c>(
    child: &Identifier,
    candidates: &'c [Identifier],
    current: Option<&Identifier>,
) -> Option<&'c Identifier> {
    let labels: Vec<String> = candidates.iter().map(Identifier::to_string).collect();
    let set = CandidateSet::new(
        candidates
            .iter()
            .zip(&labels)
            .map(|(identifier, label)| Candidate::parsed(identifier, label))
            .collect(),
    );
    let child_label = child.to_string();
    let child_candidate = Candidate::parsed(child, &child_label);

    let query = ParentQuery {
        child: &child_candidate,
        own_index: candidates.iter().position(|candidate| candidate == child),
        current: current.and_then(|current| candidates.iter().position(|c| c == current)),
    };

    RuleTable::default()
        .find_parent(&query, &set)
        .and_then(|found| candidates.get(found.index))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn ids(labels: &[&str]) -> Vec<Identifier> {
        labels.iter().map(|label| label.parse().unwrap()).collect()
    }

    fn id(label: &str) -> Identifier {
        label.parse().unwrap()
    }

    #[test_case("1", "1a"; "letter under base")]
    #[test_case("6A(a)", "6A(a)(1)"; "index under letter")]
    #[test_case("6A", "6A(a)"; "letter under option")]
    #[test_case("6", "6A"; "option under base")]
    #[test_case("9b", "9b(2)"; "index under bare letter")]
    #[test_case("4A", "4Aa_2"; "suffixed child")]
    fn direct_children(parent: &str, child: &str) {
        assert!(is_direct_child(&id(parent), &id(child)));
    }

    #[test_case("1a", "1"; "reversed")]
    #[test_case("2", "1a"; "different base")]
    #[test_case("6B", "6A(a)"; "different option")]
    #[test_case("6a", "6A(a)(1)"; "letter without option")]
    #[test_case("6A(a)", "6A(a)"; "self")]
    #[test_case("6", "6A(a)(1)"; "two levels missing")]
    fn not_direct_children(parent: &str, child: &str) {
        assert!(!is_direct_child(&id(parent), &id(child)));
    }

    #[test]
    fn skip_level_when_intermediate_missing() {
        // no "6A" header in the outline
        assert!(is_direct_child(&id("6"), &id("6A(a)")));
        let candidates = ids(&["6", "6A(a)"]);
        assert_eq!(
            find_direct_parent(&id("6A(a)"), &candidates, None),
            Some(&id("6"))
        );
    }

    #[test]
    fn skip_level_blocked_by_intermediate() {
        let candidates = ids(&["6", "6A", "6A(a)"]);
        assert_eq!(
            find_direct_parent(&id("6A(a)"), &candidates, None),
            Some(&id("6A"))
        );
    }

    #[test]
    fn structural_parent_beats_skip_level() {
        // 9b(2): "9b" matches structurally, "9" would only match by skipping
        let candidates = ids(&["9", "9b", "9b(2)"]);
        assert_eq!(
            find_direct_parent(&id("9b(2)"), &candidates, None),
            Some(&id("9b"))
        );
    }

    #[test]
    fn option_letter_parent() {
        let candidates = ids(&["6", "6A", "6A(a)", "6B"]);
        assert_eq!(
            find_direct_parent(&id("6A(a)(1)"), &candidates, None),
            Some(&id("6A(a)"))
        );
    }

    #[test]
    fn no_match_is_orphan() {
        let candidates = ids(&["1", "2", "3a"]);
        assert_eq!(find_direct_parent(&id("5b(1)"), &candidates, None), None);
        assert_eq!(find_direct_parent(&id("1"), &candidates, None), None);
    }

    #[test]
    fn suffix_agreement_breaks_ties() {
        let candidates = ids(&["4Aa", "4Aa_2"]);
        assert_eq!(
            find_direct_parent(&id("4Aa(1)_2"), &candidates, None),
            Some(&id("4Aa_2"))
        );
        assert_eq!(
            find_direct_parent(&id("4Aa(1)"), &candidates, None),
            Some(&id("4Aa"))
        );
    }

    #[test]
    fn current_parent_breaks_ties() {
        let candidates = ids(&["4Aa_2", "4Aa_3"]);
        let child = id("4Aa(1)");
        assert_eq!(
            find_direct_parent(&child, &candidates, Some(&id("4Aa_3"))),
            Some(&id("4Aa_3"))
        );
        assert_eq!(
            find_direct_parent(&child, &candidates, None),
            Some(&id("4Aa_2"))
        );
    }

    #[test]
    fn deterministic() {
        let candidates = ids(&["3", "3a", "3b", "3a(1)", "3A", "3A(a)"]);
        let child = id("3a(2)");
        let first = find_direct_parent(&child, &candidates, None);
        for _ in 0..10 {
            assert_eq!(find_direct_parent(&child, &candidates, None), first);
        }
        assert_eq!(first, Some(&id("3a")));
    }

    #[test_case("6a beef", true; "attached")]
    #[test_case("6 b dairy cattle", true; "spaced")]
    #[test_case("7a beef", false; "other base")]
    #[test_case("6a", false; "no name")]
    #[test_case("4(e)_weird!", false; "junk")]
    fn named_option_rule(label: &str, expected: bool) {
        let parent_id = id("6");
        let parent = Candidate::parsed(&parent_id, "6");
        let child = Candidate {
            identifier: None,
            raw_label: label,
            is_header: true,
        };
        let candidates = CandidateSet::new(vec![parent]);
        let probe = Probe {
            parent: &parent,
            child: &child,
            candidates: &candidates,
        };

        assert_eq!(RuleTable::default().first_match(&probe).is_some(), expected);
        assert!(
            RuleTable::without_named_options()
                .first_match(&probe)
                .is_none()
        );
    }

    #[test]
    fn custom_rules_run_after_defaults() {
        fn roman(probe: &Probe<'_, '_>) -> bool {
            probe.child.raw_label.starts_with("iv") && probe.parent.raw_label == "4"
        }

        let mut rules = RuleTable::default();
        rules.push(InferenceRule {
            name: "roman",
            rank: 5,
            predicate: roman,
        });
        assert_eq!(
            rules.rules().iter().map(|r| r.name).collect::<Vec<_>>(),
            ["structural-parent", "skip-level", "named-option", "roman"]
        );

        let parent_id = id("4");
        let parent = Candidate::parsed(&parent_id, "4");
        let child = Candidate {
            identifier: None,
            raw_label: "iv.",
            is_header: false,
        };
        let candidates = CandidateSet::new(vec![parent]);
        let query = ParentQuery {
            child: &child,
            own_index: None,
            current: None,
        };

        let found = rules.find_parent(&query, &candidates).unwrap();
        assert_eq!(found.rule, "roman");
        assert_eq!(found.index, 0);
    }

    #[test_case(false, 0; "earliest without a header")]
    #[test_case(true, 1; "header breaks the tie")]
    fn header_decides_between_equal_parents(later_is_header: bool, expected: usize) {
        let (first, second, child) = (id("2_2"), id("2_3"), id("2a"));
        let candidates = CandidateSet::new(vec![
            Candidate::parsed(&first, "2_2"),
            Candidate {
                is_header: later_is_header,
                ..Candidate::parsed(&second, "2_3")
            },
        ]);
        let child = Candidate::parsed(&child, "2a");
        let query = ParentQuery {
            child: &child,
            own_index: None,
            current: None,
        };

        let found = RuleTable::default().find_parent(&query, &candidates).unwrap();
        assert_eq!(found.rule, "structural-parent");
        assert_eq!(found.index, expected);
    }
}

//! Property tests for the grammar, the resolver and the hierarchy builder.

use std::collections::HashSet;

use proptest::prelude::*;
use reqnum::{
    Grammar, Identifier, RequirementNode, Style, build, engine::ordering::compare_identifiers,
    find_direct_parent, resolve,
};

fn component() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::char::range('a', 'z').prop_map(|c| c.to_string()),
        prop::char::range('a', 'z').prop_map(|c| format!("({c})")),
        (1u32..60).prop_map(|n| format!("({n})")),
    ]
}

/// Strings accepted by the canonical grammar, in canonical form.
fn canonical_label() -> impl Strategy<Value = String> {
    (
        1u32..200,
        prop::option::of(prop::char::range('A', 'Z')),
        prop::collection::vec(component(), 0..4),
        prop::option::of(2u32..20),
    )
        .prop_map(|(base, option, components, suffix)| {
            let mut label = base.to_string();
            if let Some(option) = option {
                label.push(option);
            }
            label.extend(components);
            if let Some(suffix) = suffix {
                label.push_str(&format!("_{suffix}"));
            }
            label
        })
}

/// Outlines drawn from a small pool so that duplicates are common.
fn flattened_outline() -> impl Strategy<Value = Vec<String>> {
    let pool = prop::sample::select(vec![
        "1", "1a", "1b", "1a(1)", "2", "2a", "2a(1)", "2b", "3", "3A", "3Aa", "3A(1)", "4(e) junk", "junk!",
    ]);
    prop::collection::vec(pool.prop_map(str::to_string), 0..30)
}

fn nodes(labels: &[String]) -> Vec<RequirementNode> {
    labels.iter().map(|label| RequirementNode::new(label.as_str())).collect()
}

proptest! {
    #[test]
    fn canonical_round_trip(label in canonical_label()) {
        let parsed = Identifier::parse_with(&label, Grammar::Canonical).unwrap();
        prop_assert_eq!(parsed.format(Style::CanonicalParenthesized), label.clone());
        prop_assert_eq!(label.parse::<Identifier>().unwrap(), parsed);
    }

    #[test]
    fn parent_is_one_level_up(label in canonical_label()) {
        let identifier: Identifier = label.parse().unwrap();
        if let Some(parent) = identifier.parent_identifier() {
            prop_assert_eq!(parent.nesting_depth() + 1, identifier.nesting_depth());
            prop_assert!(parent.is_ancestor_of(&identifier));
        } else {
            prop_assert_eq!(identifier.nesting_depth(), 0);
        }
    }

    #[test]
    fn resolution_leaves_no_duplicates(labels in flattened_outline()) {
        let resolved = resolve(nodes(&labels)).unwrap();

        let mut seen = HashSet::new();
        for identifier in resolved.nodes().iter().filter_map(RequirementNode::identifier) {
            prop_assert!(seen.insert(identifier.clone()), "duplicate {}", identifier);
        }

        let mut labels_seen = HashSet::new();
        for label in resolved.nodes().iter().map(RequirementNode::label) {
            prop_assert!(labels_seen.insert(label.clone()), "duplicate label {}", label);
        }
        prop_assert_eq!(resolved.nodes().len(), labels.len());
    }

    #[test]
    fn resolution_is_idempotent(labels in flattened_outline()) {
        let first = resolve(nodes(&labels)).unwrap();
        let second = resolve(first.nodes().to_vec()).unwrap();

        prop_assert!(second.is_unchanged());
        prop_assert_eq!(second.nodes(), first.nodes());
    }

    #[test]
    fn smaller_numbers_sort_first(
        prefix in prop::sample::select(vec!["", "a", "A", "Ab", "(3)"]),
        small in 1u32..500,
        gap in 1u32..500,
    ) {
        let large = small + gap;
        let (a, b) = if prefix.is_empty() {
            (small.to_string(), large.to_string())
        } else {
            (format!("7{prefix}({small})"), format!("7{prefix}({large})"))
        };
        let a: Identifier = a.parse().unwrap();
        let b: Identifier = b.parse().unwrap();

        prop_assert_eq!(compare_identifiers(&a, &b), std::cmp::Ordering::Less);

        // the larger one first in the input; display order still follows the numbers
        let forest = build(vec![
            RequirementNode::new(b.to_string()),
            RequirementNode::new(a.to_string()),
        ])
        .unwrap();
        prop_assert_eq!(forest.nodes()[0].identifier(), Some(&a));
    }

    #[test]
    fn parent_inference_is_deterministic(
        labels in prop::collection::vec(canonical_label(), 1..12),
        child in canonical_label(),
    ) {
        let candidates: Vec<Identifier> = labels.iter().map(|l| l.parse().unwrap()).collect();
        let child: Identifier = child.parse().unwrap();

        let first = find_direct_parent(&child, &candidates, None).cloned();
        let second = find_direct_parent(&child, &candidates, None).cloned();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn rebuilding_a_linked_outline_changes_nothing(labels in flattened_outline()) {
        let resolved = resolve(nodes(&labels)).unwrap();
        let first = build(resolved.into_nodes()).unwrap();
        let second = build(first.nodes().to_vec()).unwrap();

        prop_assert_eq!(second.nodes(), first.nodes());
    }
}

//! End-to-end scenarios over the public API.

use reqnum::{
    Config, HierarchyError, Identifier, OutlineInput, ParseError, RepairError, RequirementNode,
    build, engine::InputEntry, find_direct_parent, parse, repair, resolve,
};

fn ids(labels: &[&str]) -> Vec<Identifier> {
    labels.iter().map(|label| parse(label).unwrap()).collect()
}

fn outline(labels: &[&str]) -> OutlineInput {
    OutlineInput {
        badge: "Scenario".to_string(),
        version: Some("2024".to_string()),
        requirements: labels.iter().copied().map(InputEntry::new).collect(),
    }
}

#[test]
fn letters_attach_to_their_base() {
    let report = repair(&outline(&["1", "1a", "1b", "2"]), &Config::default()).unwrap();

    let parents: Vec<_> = report
        .rows
        .iter()
        .map(|row| row.parent_identifier.as_deref())
        .collect();
    let orders: Vec<_> = report.rows.iter().map(|row| row.display_order).collect();

    assert_eq!(parents, [None, Some("1"), Some("1"), None]);
    assert_eq!(orders, [1, 2, 3, 4]);
}

#[test]
fn repeated_labels_split_into_options() {
    let nodes = ["2", "2a", "2a(1)", "2", "2a", "2a(1)"]
        .into_iter()
        .map(RequirementNode::new)
        .collect();

    let resolved = resolve(nodes).unwrap();

    let labels: Vec<_> = resolved.nodes().iter().map(RequirementNode::label).collect();
    assert_eq!(labels, ["2A", "2Aa", "2Aa(1)", "2B", "2Ba", "2Ba(1)"]);

    let mut unique = labels.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), labels.len());
}

#[test]
fn exact_structural_parent_beats_skip_level() {
    let candidates = ids(&["9", "9b"]);
    let child = parse("9b(2)").unwrap();

    assert_eq!(
        find_direct_parent(&child, &candidates, None),
        Some(&parse("9b").unwrap())
    );
}

#[test]
fn lettered_parent_under_option() {
    let candidates = ids(&["6A(a)", "6A"]);
    let child = parse("6A(a)(1)").unwrap();

    assert_eq!(
        find_direct_parent(&child, &candidates, None),
        Some(&parse("6A(a)").unwrap())
    );
}

#[test]
fn malformed_label_is_kept_for_review() {
    assert_eq!(
        parse("4(e)_weird!"),
        Err(ParseError::Malformed("4(e)_weird!".to_string()))
    );

    let report = repair(&outline(&["4", "4a", "4(e)_weird!", "5"]), &Config::default()).unwrap();

    let weird = report.row("4(e)_weird!").unwrap();
    assert!(weird.needs_review);
    assert_eq!(weird.parent_identifier, None);

    assert_eq!(
        report.row("4a").unwrap().parent_identifier.as_deref(),
        Some("4")
    );
    assert!(!report.row("5").unwrap().needs_review);
    assert_eq!(report.rows.len(), 4);
}

#[test]
fn declared_cycle_is_fatal() {
    let a = RequirementNode::new("1a");
    let b = RequirementNode::new("1b");
    let (a_id, b_id) = (a.id(), b.id());
    let nodes = vec![a.with_parent(b_id), b.with_parent(a_id)];

    let error = build(nodes).unwrap_err();
    assert!(matches!(error, HierarchyError::Cycle { .. }));
    assert!(error.to_string().contains("1a, 1b"));

    let input = OutlineInput {
        badge: "Scenario".to_string(),
        version: None,
        requirements: vec![
            InputEntry::new("1a").with_parent("1b"),
            InputEntry::new("1b").with_parent("1a"),
        ],
    };
    assert!(matches!(
        repair(&input, &Config::default()),
        Err(RepairError::Hierarchy(HierarchyError::Cycle { .. }))
    ));
}

#[test]
fn legacy_and_canonical_rows_meet() {
    let report = repair(
        &outline(&["6", "6A", "6A1", "6A1a", "6B", "6B(1)"]),
        &Config::default(),
    )
    .unwrap();

    let rows: Vec<_> = report
        .rows
        .iter()
        .map(|row| (row.identifier.as_str(), row.parent_identifier.as_deref()))
        .collect();
    assert_eq!(
        rows,
        [
            ("6", None),
            ("6A", Some("6")),
            ("6A(1)", Some("6A")),
            ("6A(1)a", Some("6A(1)")),
            ("6B", Some("6")),
            ("6B(1)", Some("6B")),
        ]
    );
    assert!(report.is_clean());
}

//! Sibling ordering.
//!
//! Numbers compare as integers (`9` before `10`), letters compare
//! case-insensitively, and an option letter sorts before any non-option
//! sibling at the same level. Malformed labels sort after every parsed
//! identifier, in natural order of their raw text.

use std::{cmp::Ordering, num::NonZeroU32};

use crate::domain::{
    identifier::{Component, Identifier},
    node::RequirementNode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Option(char),
    Index(NonZeroU32),
    Letter(char),
}

fn segments(identifier: &Identifier) -> impl Iterator<Item = Segment> + '_ {
    identifier
        .option_letter()
        .map(|letter| Segment::Option(letter.to_ascii_lowercase()))
        .into_iter()
        .chain(identifier.components().iter().map(|component| match *component {
            Component::Letter { letter, .. } => Segment::Letter(letter.to_ascii_lowercase()),
            Component::Index { value, .. } => Segment::Index(value),
        }))
}

/// Compare two identifiers for display.
///
/// A shorter identifier sorts before any identifier it is a prefix of, and an
/// identifier without a disambiguation suffix sorts before its suffixed
/// copies.
#[must_use]
pub fn compare_identifiers(a: &Identifier, b: &Identifier) -> Ordering {
    a.base_number()
        .cmp(&b.base_number())
        .then_with(|| segments(a).cmp(segments(b)))
        .then_with(|| a.disambiguator().cmp(&b.disambiguator()))
}

/// Compare two raw labels, treating runs of digits as integers and ignoring
/// ASCII case elsewhere.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l = digit_run(&mut left);
                let r = digit_run(&mut right);
                // compare by magnitude without parsing, so long runs can't overflow
                let ordering = l
                    .trim_start_matches('0')
                    .len()
                    .cmp(&r.trim_start_matches('0').len())
                    .then_with(|| l.trim_start_matches('0').cmp(r.trim_start_matches('0')));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_ascii_lowercase().cmp(&r.to_ascii_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn digit_run(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

/// Compare two sibling rows for display.
#[must_use]
pub fn compare_siblings(a: &RequirementNode, b: &RequirementNode) -> Ordering {
    match (a.identifier(), b.identifier()) {
        (Some(a), Some(b)) => compare_identifiers(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => natural_cmp(&a.label(), &b.label()),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn id(label: &str) -> Identifier {
        label.parse().unwrap()
    }

    #[test_case("9", "10"; "numeric not lexical")]
    #[test_case("2a(9)", "2a(10)"; "nested numeric")]
    #[test_case("6A", "6a"; "option before letter")]
    #[test_case("6B", "6a"; "any option before letter")]
    #[test_case("6A", "6B"; "options in order")]
    #[test_case("1a", "1b"; "letters in order")]
    #[test_case("3(1)", "3a"; "index before letter")]
    #[test_case("1", "1a"; "parent first")]
    #[test_case("4Aa", "4Aa_2"; "unsuffixed first")]
    #[test_case("4Aa_2", "4Aa_3"; "suffixes in order")]
    fn sorts_before(a: &str, b: &str) {
        assert_eq!(compare_identifiers(&id(a), &id(b)), Ordering::Less);
        assert_eq!(compare_identifiers(&id(b), &id(a)), Ordering::Greater);
    }

    #[test]
    fn parenthesization_is_ignored() {
        assert_eq!(compare_identifiers(&id("2(a)"), &id("2a")), Ordering::Equal);
    }

    #[test_case("item 2", "item 10", Ordering::Less; "numeric runs")]
    #[test_case("Beef", "beef", Ordering::Less; "case only falls back to bytes")]
    #[test_case("abc", "ABD", Ordering::Less; "case insensitive")]
    #[test_case("x007", "x7", Ordering::Less; "leading zeros")]
    #[test_case("note", "note 1", Ordering::Less; "prefix first")]
    fn natural(a: &str, b: &str, expected: Ordering) {
        assert_eq!(natural_cmp(a, b), expected);
    }

    #[test]
    fn malformed_rows_sort_last() {
        let mut nodes = vec![
            RequirementNode::new("z note"),
            RequirementNode::new("10"),
            RequirementNode::new("a note"),
            RequirementNode::new("9"),
        ];
        nodes.sort_by(compare_siblings);
        let labels: Vec<_> = nodes.iter().map(RequirementNode::raw_label).collect();
        assert_eq!(labels, ["9", "10", "a note", "z note"]);
    }
}

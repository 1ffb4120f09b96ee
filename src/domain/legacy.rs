//! Conversion to and from the deprecated concatenated display column.
//!
//! The canonical parenthesized form is the single source of truth. The legacy
//! form (`6A1a`, `9b2`) is derived from it for display only: formatting to the
//! legacy form is lossy, so it is never read back when a canonical value is
//! available for the same row.

use super::identifier::{Grammar, Identifier, ParseError, Style};

/// Render an identifier for the legacy display column.
#[must_use]
pub fn to_legacy_display(identifier: &Identifier) -> String {
    identifier.format(Style::LegacyConcatenated)
}

/// Parse a value read from the legacy display column.
///
/// # Errors
///
/// Returns [`ParseError::Malformed`] if the value matches neither the
/// canonical grammar nor one of the legacy shapes.
pub fn from_legacy_display(raw: &str) -> Result<Identifier, ParseError> {
    Identifier::parse_with(raw, Grammar::CanonicalOrLegacy)
}

/// Whether the legacy rendering of `identifier` parses back to the same
/// identifier.
#[must_use]
pub fn is_lossless(identifier: &Identifier) -> bool {
    from_legacy_display(&to_legacy_display(identifier)).is_ok_and(|back| &back == identifier)
}

/// Pick the identifier for a stored row that may carry either column.
///
/// The canonical value wins whenever it is present; the legacy value is only
/// consulted for rows that never had a canonical one. Returns `Ok(None)` when
/// both are absent or blank.
///
/// # Errors
///
/// Returns the parse error of whichever column was chosen.
pub fn resolve_stored(
    canonical: Option<&str>,
    legacy: Option<&str>,
) -> Result<Option<Identifier>, ParseError> {
    fn present(value: Option<&str>) -> Option<&str> {
        value.filter(|v| !v.trim().is_empty())
    }

    match (present(canonical), present(legacy)) {
        (Some(canonical), _) => Identifier::parse_with(canonical, Grammar::Canonical).map(Some),
        (None, Some(legacy)) => from_legacy_display(legacy).map(Some),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("1a"; "digit letter")]
    #[test_case("9b(2)"; "letter index")]
    #[test_case("6A(1)a"; "option index letter")]
    #[test_case("6A"; "option only")]
    fn lossless_shapes(input: &str) {
        let id: Identifier = input.parse().unwrap();
        assert!(is_lossless(&id));
    }

    #[test_case("6A(a)(1)"; "letter before index under option")]
    #[test_case("2a(1)(b)"; "too deep for legacy shapes")]
    fn lossy_shapes(input: &str) {
        let id: Identifier = input.parse().unwrap();
        assert!(!is_lossless(&id));
    }

    #[test]
    fn legacy_input_parses() {
        let id = from_legacy_display("6A1a").unwrap();
        assert_eq!(id.to_string(), "6A(1)a");
    }

    #[test]
    fn canonical_column_wins() {
        let id = resolve_stored(Some("6A(a)(1)"), Some("6A1a")).unwrap().unwrap();
        assert_eq!(id.to_string(), "6A(a)(1)");
    }

    #[test]
    fn canonical_column_is_not_parsed_as_legacy() {
        assert!(resolve_stored(Some("9b2"), None).is_err());
    }

    #[test]
    fn legacy_column_used_when_canonical_blank() {
        let id = resolve_stored(Some("  "), Some("9b2")).unwrap().unwrap();
        assert_eq!(id.to_string(), "9b(2)");
    }

    #[test]
    fn both_absent() {
        assert_eq!(resolve_stored(None, None), Ok(None));
    }
}

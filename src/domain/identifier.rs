use std::{fmt, num::NonZeroU32, str::FromStr};

use serde::{Deserialize, Serialize};

/// One nesting level below the base number and option letter.
///
/// Equality, ordering and hashing only consider the letter or index; whether
/// the component was written in parentheses is kept for formatting.
#[derive(Debug, Clone, Copy)]
pub enum Component {
    /// A lowercase letter, such as the `b` in `9b(2)`.
    Letter {
        /// The letter, always ASCII lowercase.
        letter: char,
        /// Whether the source wrote `(b)` rather than `b`.
        parenthesized: bool,
    },
    /// A positive index, such as the `2` in `9b(2)`.
    Index {
        /// The index value.
        value: NonZeroU32,
        /// Whether the source wrote `(2)` rather than a bare legacy `2`.
        parenthesized: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum ComponentKey {
    Index(NonZeroU32),
    Letter(char),
}

impl Component {
    /// A bare lowercase letter component.
    ///
    /// Returns `None` unless `letter` is an ASCII lowercase letter.
    #[must_use]
    pub const fn letter(letter: char) -> Option<Self> {
        if letter.is_ascii_lowercase() {
            Some(Self::Letter {
                letter,
                parenthesized: false,
            })
        } else {
            None
        }
    }

    /// A parenthesized index component.
    #[must_use]
    pub const fn index(value: NonZeroU32) -> Self {
        Self::Index {
            value,
            parenthesized: true,
        }
    }

    /// Whether this component is a letter.
    #[must_use]
    pub const fn is_letter(&self) -> bool {
        matches!(self, Self::Letter { .. })
    }

    /// Whether this component is an index.
    #[must_use]
    pub const fn is_index(&self) -> bool {
        matches!(self, Self::Index { .. })
    }

    /// Whether the source wrote this component in parentheses.
    #[must_use]
    pub const fn was_parenthesized(&self) -> bool {
        match self {
            Self::Letter { parenthesized, .. } | Self::Index { parenthesized, .. } => *parenthesized,
        }
    }

    const fn key(&self) -> ComponentKey {
        match *self {
            Self::Letter { letter, .. } => ComponentKey::Letter(letter),
            Self::Index { value, .. } => ComponentKey::Index(value),
        }
    }

    fn write_canonical(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Letter {
                letter,
                parenthesized: true,
            } => write!(f, "({letter})"),
            Self::Letter { letter, .. } => write!(f, "{letter}"),
            // bare digits only exist in the legacy grammar
            Self::Index { value, .. } => write!(f, "({value})"),
        }
    }

    fn write_legacy(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Letter { letter, .. } => write!(f, "{letter}"),
            Self::Index { value, .. } => write!(f, "{value}"),
        }
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Component {}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::hash::Hash for Component {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// A parsed requirement number, such as `6A(a)(1)`, `9b(2)` or `4Aa_2`.
///
/// Format:
/// `{BASE}{OPTION?}{COMPONENT*}{_N?}`, where:
/// - `BASE` is a positive integer (the top-level requirement)
/// - `OPTION` is an optional uppercase letter naming an "Option" branch
/// - each `COMPONENT` is a bare lowercase letter, `(letter)` or `(digits)`
/// - `_N` is an optional disambiguation suffix (`N >= 2`) added when
///   duplicates could not be resolved structurally
///
/// The legacy concatenated shapes `1a`, `9b2`, `6A1` and `6A1a` are accepted
/// as well; see [`Grammar`].
///
/// Identifiers are values: rewrites return a new identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    base: NonZeroU32,
    option: Option<char>,
    components: Vec<Component>,
    disambiguator: Option<NonZeroU32>,
}

/// Which surface syntaxes [`Identifier::parse_with`] accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Grammar {
    /// Only the canonical parenthesized grammar.
    Canonical,
    /// The canonical grammar, falling back to the legacy concatenated shapes.
    #[default]
    CanonicalOrLegacy,
}

/// Output encodings for [`Identifier::display`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Style {
    /// Base number, option letter, then each component; indices are always
    /// parenthesized, letters keep the form they were parsed with.
    #[default]
    CanonicalParenthesized,
    /// Everything concatenated without parentheses.
    ///
    /// This is lossy. When an option letter is present together with more
    /// than one component, indices are written before letters.
    LegacyConcatenated,
}

/// Errors that can occur when parsing a requirement number.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    /// The input matches neither the canonical nor the legacy grammar.
    #[error("Malformed requirement number '{0}'")]
    Malformed(String),
}

impl ParseError {
    /// The input that failed to parse.
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::Malformed(raw) => raw,
        }
    }
}

impl Identifier {
    /// Create an identifier from pre-validated parts.
    ///
    /// Returns `None` if `option` is present but not an ASCII uppercase
    /// letter.
    #[must_use]
    pub fn new(base: NonZeroU32, option: Option<char>, components: Vec<Component>) -> Option<Self> {
        if option.is_some_and(|letter| !letter.is_ascii_uppercase()) {
            return None;
        }
        Some(Self {
            base,
            option,
            components,
            disambiguator: None,
        })
    }

    /// Parse a requirement number using the given grammar.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Malformed`] if the input matches none of the
    /// accepted shapes.
    pub fn parse_with(raw: &str, grammar: Grammar) -> Result<Self, ParseError> {
        let malformed = || ParseError::Malformed(raw.to_string());
        let tokens = lex(raw.trim()).ok_or_else(malformed)?;
        let (body, disambiguator) = split_disambiguator(&tokens).ok_or_else(malformed)?;

        let identifier = match grammar {
            Grammar::Canonical => canonical(body),
            Grammar::CanonicalOrLegacy => canonical(body).or_else(|| legacy(body)),
        };

        identifier
            .map(|identifier| Self {
                disambiguator,
                ..identifier
            })
            .ok_or_else(malformed)
    }

    /// The top-level requirement number.
    #[must_use]
    pub const fn base_number(&self) -> NonZeroU32 {
        self.base
    }

    /// The option letter, if this is an option variant.
    #[must_use]
    pub const fn option_letter(&self) -> Option<char> {
        self.option
    }

    /// Whether an option letter is present.
    #[must_use]
    pub const fn is_option_variant(&self) -> bool {
        self.option.is_some()
    }

    /// The sub-components, outermost first.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The `_N` disambiguation suffix, if any.
    #[must_use]
    pub const fn disambiguator(&self) -> Option<NonZeroU32> {
        self.disambiguator
    }

    /// Whether this identifier carries a disambiguation suffix and so cannot
    /// be trusted as canonical.
    #[must_use]
    pub const fn needs_review(&self) -> bool {
        self.disambiguator.is_some()
    }

    /// Number of nesting levels below the base number.
    ///
    /// The option letter counts as one level, each component as another.
    #[must_use]
    pub fn nesting_depth(&self) -> usize {
        usize::from(self.option.is_some()) + self.components.len()
    }

    /// The structural parent, obtained by dropping the last component (or the
    /// option letter when no components remain).
    ///
    /// This assumes no intermediate level is missing; the inference engine
    /// checks against the real outline. The disambiguation suffix is not
    /// carried over.
    #[must_use]
    pub fn parent_identifier(&self) -> Option<Self> {
        let mut parent = self.without_disambiguator();
        if parent.components.pop().is_none() {
            parent.option.take()?;
        }
        Some(parent)
    }

    /// All structural ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Self> {
        std::iter::successors(self.parent_identifier(), Self::parent_identifier)
    }

    /// Whether `self` is a structural ancestor of `other`.
    ///
    /// Disambiguation suffixes are ignored on both sides.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        let this = self.without_disambiguator();
        other.ancestors().any(|ancestor| ancestor == this)
    }

    /// The same identifier without its `_N` suffix.
    #[must_use]
    pub fn without_disambiguator(&self) -> Self {
        Self {
            disambiguator: None,
            ..self.clone()
        }
    }

    /// The same identifier with the given `_N` suffix.
    #[must_use]
    pub fn with_disambiguator(&self, suffix: NonZeroU32) -> Self {
        Self {
            disambiguator: Some(suffix),
            ..self.clone()
        }
    }

    /// Insert an option letter directly after the base number.
    ///
    /// Returns `None` if this identifier already has an option letter or
    /// `letter` is not ASCII uppercase.
    #[must_use]
    pub fn with_option_letter(&self, letter: char) -> Option<Self> {
        if self.option.is_some() || !letter.is_ascii_uppercase() {
            return None;
        }
        Some(Self {
            option: Some(letter),
            ..self.clone()
        })
    }

    /// Append `components` below this identifier, keeping `suffix`.
    #[must_use]
    pub fn extended(&self, components: &[Component], suffix: Option<NonZeroU32>) -> Self {
        let mut extended = self.without_disambiguator();
        extended.components.extend_from_slice(components);
        extended.disambiguator = suffix;
        extended
    }

    /// Returns a displayable representation in the given style.
    ///
    /// # Examples
    ///
    /// ```
    /// use reqnum::{Identifier, Style};
    ///
    /// let id: Identifier = "6A(a)(1)".parse().unwrap();
    ///
    /// assert_eq!(id.display(Style::CanonicalParenthesized).to_string(), "6A(a)(1)");
    /// assert_eq!(id.display(Style::LegacyConcatenated).to_string(), "6A1a");
    /// ```
    #[must_use]
    pub const fn display(&self, style: Style) -> FormattedIdentifier<'_> {
        FormattedIdentifier {
            identifier: self,
            style,
        }
    }

    /// Render the identifier in the given style.
    #[must_use]
    pub fn format(&self, style: Style) -> String {
        self.display(style).to_string()
    }
}

/// A wrapper type that formats an identifier in a chosen [`Style`].
///
/// Returned by [`Identifier::display`].
#[derive(Debug, Clone, Copy)]
pub struct FormattedIdentifier<'a> {
    identifier: &'a Identifier,
    style: Style,
}

impl fmt::Display for FormattedIdentifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.identifier;
        write!(f, "{}", id.base)?;
        if let Some(option) = id.option {
            write!(f, "{option}")?;
        }

        match self.style {
            Style::CanonicalParenthesized => {
                for component in &id.components {
                    component.write_canonical(f)?;
                }
            }
            Style::LegacyConcatenated if id.option.is_some() && id.components.len() > 1 => {
                let (indices, letters): (Vec<&Component>, Vec<&Component>) =
                    id.components.iter().partition(|c| c.is_index());
                for component in indices.into_iter().chain(letters) {
                    component.write_legacy(f)?;
                }
            }
            Style::LegacyConcatenated => {
                for component in &id.components {
                    component.write_legacy(f)?;
                }
            }
        }

        if let Some(suffix) = id.disambiguator {
            write!(f, "_{suffix}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.display(Style::CanonicalParenthesized).fmt(f)
    }
}

impl FromStr for Identifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with(s, Grammar::CanonicalOrLegacy)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = ParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl TryFrom<String> for Identifier {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<Identifier> for String {
    fn from(identifier: Identifier) -> Self {
        identifier.to_string()
    }
}

/// Parse a requirement number, accepting canonical and legacy shapes.
///
/// # Errors
///
/// Returns [`ParseError::Malformed`] if the input matches neither grammar.
pub fn parse(raw: &str) -> Result<Identifier, ParseError> {
    raw.parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Number(u32),
    Upper(char),
    Lower(char),
    Open,
    Close,
    Underscore,
}

fn lex(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        let token = match c {
            '0'..='9' => {
                let mut value = c.to_digit(10)?;
                while let Some(digit) = chars.peek().and_then(|d| d.to_digit(10)) {
                    chars.next();
                    value = value.checked_mul(10)?.checked_add(digit)?;
                }
                Token::Number(value)
            }
            'A'..='Z' => Token::Upper(c),
            'a'..='z' => Token::Lower(c),
            '(' => Token::Open,
            ')' => Token::Close,
            '_' => Token::Underscore,
            _ => return None,
        };
        tokens.push(token);
    }

    Some(tokens)
}

fn split_disambiguator(tokens: &[Token]) -> Option<(&[Token], Option<NonZeroU32>)> {
    match tokens {
        [body @ .., Token::Underscore, Token::Number(suffix)] => {
            let suffix = NonZeroU32::new(*suffix).filter(|n| n.get() >= 2)?;
            Some((body, Some(suffix)))
        }
        _ => Some((tokens, None)),
    }
}

/// `digits [A-Z]? ( [a-z] | "(" [a-z] ")" | "(" digits ")" )*`
fn canonical(tokens: &[Token]) -> Option<Identifier> {
    let [Token::Number(base), rest @ ..] = tokens else {
        return None;
    };
    let base = NonZeroU32::new(*base)?;

    let (option, mut rest) = match rest {
        [Token::Upper(letter), rest @ ..] => (Some(*letter), rest),
        _ => (None, rest),
    };

    let mut components = Vec::new();
    loop {
        let (component, tail) = match rest {
            [] => break,
            [Token::Lower(letter), tail @ ..] => (
                Component::Letter {
                    letter: *letter,
                    parenthesized: false,
                },
                tail,
            ),
            [Token::Open, Token::Lower(letter), Token::Close, tail @ ..] => (
                Component::Letter {
                    letter: *letter,
                    parenthesized: true,
                },
                tail,
            ),
            [Token::Open, Token::Number(value), Token::Close, tail @ ..] => {
                (Component::index(NonZeroU32::new(*value)?), tail)
            }
            _ => return None,
        };
        components.push(component);
        rest = tail;
    }

    Some(Identifier {
        base,
        option,
        components,
        disambiguator: None,
    })
}

/// The only unparenthesized shapes the legacy display column ever held:
/// `1a`, `9b2`, `6A1` and `6A1a`.
fn legacy(tokens: &[Token]) -> Option<Identifier> {
    let letter = |letter| Component::Letter {
        letter,
        parenthesized: false,
    };
    let index = |value| {
        NonZeroU32::new(value).map(|value| Component::Index {
            value,
            parenthesized: false,
        })
    };

    let (base, option, components) = match *tokens {
        [Token::Number(base), Token::Lower(l)] => (base, None, vec![letter(l)]),
        [Token::Number(base), Token::Lower(l), Token::Number(i)] => {
            (base, None, vec![letter(l), index(i)?])
        }
        [Token::Number(base), Token::Upper(o), Token::Number(i)] => (base, Some(o), vec![index(i)?]),
        [
            Token::Number(base),
            Token::Upper(o),
            Token::Number(i),
            Token::Lower(l),
        ] => (base, Some(o), vec![index(i)?, letter(l)]),
        _ => return None,
    };

    Some(Identifier {
        base: NonZeroU32::new(base)?,
        option,
        components,
        disambiguator: None,
    })
}

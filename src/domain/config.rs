use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::domain::{identifier::Grammar, node::OutlineKey};

/// Configuration for outline repair.
///
/// Badge-specific renumbering tables live here rather than in the inference
/// rules: they are data about individual badges, not structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The display order assigned to the first requirement of an outline.
    display_order_start: u32,

    /// Whether free-text "named option" labels (`6a beef`) may be attached to
    /// their base number.
    pub named_option_rule: bool,

    /// Whether the legacy concatenated shapes (`9b2`, `6A1a`) are accepted in
    /// scraped labels.
    ///
    /// When `false` such labels are reported as malformed.
    pub accept_legacy_input: bool,

    /// Literal label replacements for individual badges.
    renumbering: Vec<RenumberTable>,
}

/// Literal label replacements applied to one badge before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenumberTable {
    /// Badge the table applies to.
    pub badge: String,

    /// Requirements version the table applies to. `None` matches every
    /// version of the badge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Scraped label to replacement label.
    pub labels: BTreeMap<String, String>,
}

impl RenumberTable {
    /// Whether this table applies to the given outline.
    #[must_use]
    pub fn applies_to(&self, key: &OutlineKey) -> bool {
        self.badge.eq_ignore_ascii_case(&key.badge)
            && self
                .version
                .as_ref()
                .is_none_or(|version| key.version.as_ref() == Some(version))
    }

    /// The replacement for `label`, if the table has one.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.labels.get(label.trim()).map(String::as_str)
    }
}

/// Errors that can occur when loading or saving a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    /// The file is not valid configuration TOML.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// The configuration could not be serialized.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// The file could not be written.
    #[error("Failed to write config file: {0}")]
    Write(#[source] std::io::Error),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display_order_start: default_display_order_start(),
            named_option_rule: true,
            accept_legacy_input: true,
            renumbering: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(ConfigError::Write)
    }

    /// The display order assigned to the first requirement of an outline.
    #[must_use]
    pub const fn display_order_start(&self) -> u32 {
        self.display_order_start
    }

    /// Sets the first display order. Zero is raised to one.
    pub fn set_display_order_start(&mut self, start: u32) {
        self.display_order_start = start.max(1);
    }

    /// The grammar scraped labels are parsed with.
    #[must_use]
    pub const fn grammar(&self) -> Grammar {
        if self.accept_legacy_input {
            Grammar::CanonicalOrLegacy
        } else {
            Grammar::Canonical
        }
    }

    /// All renumbering tables.
    #[must_use]
    pub fn renumbering(&self) -> &[RenumberTable] {
        &self.renumbering
    }

    /// Adds a renumbering table.
    pub fn add_renumbering(&mut self, table: RenumberTable) {
        self.renumbering.push(table);
    }

    /// The tables that apply to the given outline, most specific first.
    ///
    /// A table pinned to the outline's version is consulted before a table
    /// covering every version of the badge.
    #[must_use]
    pub fn renumbering_for(&self, key: &OutlineKey) -> Vec<&RenumberTable> {
        let mut tables: Vec<_> = self
            .renumbering
            .iter()
            .filter(|table| table.applies_to(key))
            .collect();
        tables.sort_by_key(|table| table.version.is_none());
        tables
    }

    /// Apply the renumbering tables for `key` to a scraped label.
    #[must_use]
    pub fn renumber(&self, key: &OutlineKey, label: &str) -> Option<String> {
        self.renumbering_for(key)
            .into_iter()
            .find_map(|table| table.get(label))
            .map(str::to_string)
    }
}

const fn default_display_order_start() -> u32 {
    1
}

const fn default_true() -> bool {
    true
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_display_order_start")]
        display_order_start: u32,

        #[serde(default = "default_true")]
        named_option_rule: bool,

        #[serde(default = "default_true")]
        accept_legacy_input: bool,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        renumbering: Vec<RenumberTable>,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                display_order_start,
                named_option_rule,
                accept_legacy_input,
                renumbering,
            } => Self {
                display_order_start: display_order_start.max(1),
                named_option_rule,
                accept_legacy_input,
                renumbering,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            display_order_start: config.display_order_start,
            named_option_rule: config.named_option_rule,
            accept_legacy_input: config.accept_legacy_input,
            renumbering: config.renumbering,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CYCLING: &str = r#"_version = "1"
display_order_start = 10
named_option_rule = false

[[renumbering]]
badge = "Cycling"
version = "2023"
labels = { "8" = "8A", "8a" = "8A(a)" }

[[renumbering]]
badge = "Cycling"
labels = { "8" = "8B" }
"#;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CYCLING.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.display_order_start(), 10);
        assert!(!config.named_option_rule);
        assert!(config.accept_legacy_input);
        assert_eq!(config.renumbering().len(), 2);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(matches!(error, ConfigError::Read(_)));
        assert!(error.to_string().starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\ndisplay_order_start = \"one\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.to_string().starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("reqnum.toml");
        let config: Config = toml::from_str(CYCLING).unwrap();

        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn version_specific_table_wins() {
        let config: Config = toml::from_str(CYCLING).unwrap();
        let pinned = OutlineKey::new("cycling", Some("2023".to_string()));
        let other = OutlineKey::new("Cycling", Some("2019".to_string()));

        assert_eq!(config.renumber(&pinned, "8").as_deref(), Some("8A"));
        assert_eq!(config.renumber(&pinned, " 8a ").as_deref(), Some("8A(a)"));
        assert_eq!(config.renumber(&other, "8").as_deref(), Some("8B"));
        assert_eq!(config.renumber(&other, "8a"), None);
        assert_eq!(
            config.renumber(&OutlineKey::new("Swimming", None), "8"),
            None
        );
    }

    #[test]
    fn zero_start_is_raised() {
        let config: Config = toml::from_str("_version = \"1\"\ndisplay_order_start = 0").unwrap();
        assert_eq!(config.display_order_start(), 1);
    }

    #[test]
    fn grammar_follows_legacy_flag() {
        let mut config = Config::default();
        assert_eq!(config.grammar(), Grammar::CanonicalOrLegacy);
        config.accept_legacy_input = false;
        assert_eq!(config.grammar(), Grammar::Canonical);
    }
}

//! Domain models for requirement numbering.
//!
//! This module contains the identifier grammar, the legacy display
//! conversion, the requirement rows of an outline, and configuration.

/// Requirement identifier types and parsing.
pub mod identifier;
pub use identifier::{Component, FormattedIdentifier, Grammar, Identifier, ParseError, Style};

pub mod legacy;

/// Requirement rows and outlines.
pub mod node;
pub use node::{NodeId, Outline, OutlineKey, RequirementNode};

mod config;
pub use config::{Config, ConfigError, RenumberTable};

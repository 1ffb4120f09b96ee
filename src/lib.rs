//! Requirement numbering for advancement outlines.
//!
//! Parses outline identifiers such as `6A(a)(1)`, `9b(2)` and `4Aa_2`,
//! infers parent links, splits repeated identifiers into option branches,
//! and orders the result for display.

pub mod domain;
pub use domain::{
    Component, Config, Grammar, Identifier, NodeId, Outline, OutlineKey, ParseError,
    RequirementNode, Style, identifier::parse,
};

pub mod engine;
pub use engine::{
    Finding, Forest, HierarchyError, OutlineInput, RepairError, RepairReport, ResolutionError,
    RuleTable, build, find_direct_parent, is_direct_child, repair, resolve,
};

/// Loading outline documents and writing repair reports.
pub mod storage;
pub use storage::{LoadError, OutlineSet};

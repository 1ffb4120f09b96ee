//! The numbering engine.
//!
//! Everything here is a pure function over a caller-owned outline: no I/O, no
//! logging, no state shared between calls. Outlines are independent, so
//! callers may repair several in parallel.

pub mod hierarchy;
pub mod inference;
pub mod ordering;
pub mod repair;
pub mod resolver;

pub use hierarchy::{Forest, HierarchyBuilder, HierarchyError, InferredLink, build};
pub use inference::{
    Candidate, CandidateSet, InferenceRule, ParentMatch, ParentQuery, Probe, RuleTable,
    find_direct_parent, is_direct_child,
};
pub use repair::{
    Finding, InputEntry, OutlineInput, OutputRow, RepairError, RepairReport, repair,
    repair_outline,
};
pub use resolver::{Relabel, ResolutionError, ResolvedOutline, Rewrite, RewriteKind, resolve};

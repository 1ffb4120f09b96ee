pub mod directory;
/// Outline documents in YAML or JSON.
pub mod outline_file;

pub use directory::{OutlineSet, Outcome, SetLoadError, Source};
pub use outline_file::{Format, LoadError, WriteError};

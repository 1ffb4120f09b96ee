//! Outline documents on disk.
//!
//! A document holds the scraper's rows for one outline, or for several under
//! an `outlines` key, as YAML or JSON. Repair reports are written back in the
//! same formats.

use std::{
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::engine::{OutlineInput, RepairReport};

/// Document encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

impl Format {
    /// The format implied by a file extension, if any.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(OsStr::to_str)?;
        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Errors that can occur when loading an outline document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The file is not a valid JSON outline document.
    #[error("invalid JSON outline document {}", path.display())]
    Json {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The file is not a valid YAML outline document.
    #[error("invalid YAML outline document {}", path.display())]
    Yaml {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_yaml::Error,
    },
    /// The file extension names no known format.
    #[error("unrecognised outline document {}", .0.display())]
    UnknownFormat(PathBuf),
}

impl LoadError {
    /// The file that failed to load.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Json { path, .. }
            | Self::Yaml { path, .. }
            | Self::UnknownFormat(path) => path,
        }
    }
}

/// Errors that can occur when writing repair reports.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The reports could not be encoded as JSON.
    #[error("failed to encode reports as JSON")]
    Json(#[from] serde_json::Error),
    /// The reports could not be encoded as YAML.
    #[error("failed to encode reports as YAML")]
    Yaml(#[from] serde_yaml::Error),
    /// The file could not be written.
    #[error("failed to write {}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    Many { outlines: Vec<OutlineInput> },
    One(OutlineInput),
}

impl From<Document> for Vec<OutlineInput> {
    fn from(document: Document) -> Self {
        match document {
            Document::Many { outlines } => outlines,
            Document::One(outline) => vec![outline],
        }
    }
}

#[derive(Debug, Serialize)]
struct Reports<'a> {
    outlines: &'a [RepairReport],
}

/// Load every outline in a document, choosing the format by extension.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has an unrecognised
/// extension, or does not decode as an outline document.
pub fn load(path: &Path) -> Result<Vec<OutlineInput>, LoadError> {
    let format = Format::from_path(path).ok_or_else(|| LoadError::UnknownFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let document: Document = match format {
        Format::Json => serde_json::from_str(&content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        Format::Yaml => serde_yaml::from_str(&content).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        })?,
    };

    Ok(document.into())
}

/// Encode repair reports.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn render(reports: &[RepairReport], format: Format) -> Result<String, WriteError> {
    let document = Reports { outlines: reports };
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(&document)?,
        Format::Yaml => serde_yaml::to_string(&document)?,
    })
}

/// Write repair reports to `path`.
///
/// # Errors
///
/// Returns an error if encoding fails or the file cannot be written.
pub fn save(path: &Path, reports: &[RepairReport], format: Format) -> Result<(), WriteError> {
    let content = render(reports, format)?;
    fs::write(path, content).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

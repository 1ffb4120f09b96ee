//! Batches of outline documents.
//!
//! An [`OutlineSet`] is every outline found under a list of files and
//! directories. Outlines are independent, so they are loaded and repaired in
//! parallel.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use nonempty::NonEmpty;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::instrument;
use walkdir::WalkDir;

use crate::{
    domain::{Config, OutlineKey},
    engine::{OutlineInput, RepairError, RepairReport, repair},
    storage::outline_file::{self, Format, LoadError},
};

/// The outlines loaded from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// The document.
    pub path: PathBuf,
    /// Its outlines, in document order.
    pub outlines: Vec<OutlineInput>,
}

/// Every outline found under a set of paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlineSet {
    sources: Vec<Source>,
}

/// One or more documents could not be loaded.
#[derive(Debug, thiserror::Error)]
pub struct SetLoadError {
    failures: NonEmpty<LoadError>,
}

impl SetLoadError {
    /// The individual failures, in path order.
    #[must_use]
    pub const fn failures(&self) -> &NonEmpty<LoadError> {
        &self.failures
    }
}

impl fmt::Display for SetLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load outline documents: ")?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", failure.path().display())?;
        }
        Ok(())
    }
}

/// The result of repairing one outline of a set.
#[derive(Debug)]
pub struct Outcome {
    /// The document the outline came from.
    pub source: PathBuf,
    /// The outline's key.
    pub key: OutlineKey,
    /// The report, or why the outline could not be repaired.
    pub result: Result<RepairReport, RepairError>,
}

impl OutlineSet {
    /// Load every outline document under `paths`.
    ///
    /// Directories are walked recursively; only files with a `.json`, `.yaml`
    /// or `.yml` extension are read from them. Files named directly must have
    /// one of those extensions too.
    ///
    /// # Errors
    ///
    /// Returns every document that failed to load. Nothing is returned for
    /// the documents that did load, so a batch is repaired entirely or not at
    /// all.
    #[instrument(skip_all)]
    pub fn load(paths: &[PathBuf]) -> Result<Self, SetLoadError> {
        let files = collect_documents(paths);
        tracing::debug!("found {} outline documents", files.len());

        let (loaded, failed): (Vec<_>, Vec<_>) = files
            .par_iter()
            .map(|path| {
                outline_file::load(path).map(|outlines| Source {
                    path: path.clone(),
                    outlines,
                })
            })
            .partition(Result::is_ok);

        let failures: Vec<LoadError> = failed.into_iter().filter_map(Result::err).collect();
        if let Some(failures) = NonEmpty::from_vec(failures) {
            for failure in failures.iter() {
                tracing::debug!("{failure}");
            }
            return Err(SetLoadError { failures });
        }

        let sources: Vec<Source> = loaded.into_iter().filter_map(Result::ok).collect();
        tracing::info!(
            "loaded {} outlines from {} documents",
            sources.iter().map(|s| s.outlines.len()).sum::<usize>(),
            sources.len()
        );
        Ok(Self { sources })
    }

    /// The loaded documents, in path order.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Iterate over every outline with the document it came from.
    pub fn outlines(&self) -> impl Iterator<Item = (&Path, &OutlineInput)> {
        self.sources.iter().flat_map(|source| {
            source
                .outlines
                .iter()
                .map(move |outline| (source.path.as_path(), outline))
        })
    }

    /// Total number of outlines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.iter().map(|source| source.outlines.len()).sum()
    }

    /// Whether no outlines were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Repair every outline in parallel.
    ///
    /// Outcomes are returned in load order. A failure only affects its own
    /// outline.
    #[instrument(skip_all)]
    pub fn repair_all(&self, config: &Config) -> Vec<Outcome> {
        let outlines: Vec<_> = self.outlines().collect();

        outlines
            .par_iter()
            .map(|&(source, outline)| {
                let key = outline.key();
                let result = repair(outline, config);
                match &result {
                    Ok(report) => tracing::debug!(
                        "repaired {key}: {} rows, {} findings",
                        report.rows.len(),
                        report.findings.len()
                    ),
                    Err(e) => tracing::warn!("cannot repair {key} from {}: {e}", source.display()),
                }
                Outcome {
                    source: source.to_path_buf(),
                    key,
                    result,
                }
            })
            .collect()
    }
}

fn collect_documents(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = paths
        .iter()
        .flat_map(|path| -> Vec<PathBuf> {
            if path.is_dir() {
                WalkDir::new(path)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_type().is_file())
                    .filter(|entry| Format::from_path(entry.path()).is_some())
                    .map(walkdir::DirEntry::into_path)
                    .collect()
            } else {
                vec![path.clone()]
            }
        })
        .collect();
    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn walks_directories_for_documents() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            &tmp.path().join("b/hiking.json"),
            r#"{"badge": "Hiking", "requirements": [{"label": "1"}]}"#,
        );
        write(
            &tmp.path().join("a/cooking.yaml"),
            "badge: Cooking\nrequirements:\n  - label: '1'\n  - label: 1a\n",
        );
        write(&tmp.path().join("a/notes.md"), "# not an outline");

        let set = OutlineSet::load(&[tmp.path().to_path_buf()]).unwrap();

        assert_eq!(set.len(), 2);
        let badges: Vec<_> = set.outlines().map(|(_, o)| o.badge.as_str()).collect();
        assert_eq!(badges, ["Cooking", "Hiking"]);
    }

    #[test]
    fn any_failure_fails_the_batch() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            &tmp.path().join("good.json"),
            r#"{"badge": "Hiking", "requirements": []}"#,
        );
        write(&tmp.path().join("bad.yaml"), "badge: [");

        let error = OutlineSet::load(&[tmp.path().to_path_buf()]).unwrap_err();

        assert_eq!(error.failures().len(), 1);
        assert!(error.to_string().contains("bad.yaml"));
    }

    #[test]
    fn explicit_files_need_a_known_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("outline.txt");
        write(&path, "badge: Cooking\nrequirements: []\n");

        let error = OutlineSet::load(&[path]).unwrap_err();
        assert!(matches!(
            error.failures().first(),
            LoadError::UnknownFormat(_)
        ));
    }

    #[test]
    fn repairs_each_outline_independently() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            &tmp.path().join("batch.json"),
            r#"{"outlines": [
                {"badge": "Cycle", "requirements": [
                    {"label": "A", "parent": "B"},
                    {"label": "B", "parent": "A"}
                ]},
                {"badge": "Fine", "requirements": [{"label": "1"}, {"label": "1a"}]}
            ]}"#,
        );
        let set = OutlineSet::load(&[tmp.path().to_path_buf()]).unwrap();

        let outcomes = set.repair_all(&Config::default());

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].key.badge, "Cycle");
        assert!(outcomes[0].result.is_err());
        let fine = outcomes[1].result.as_ref().unwrap();
        assert_eq!(fine.rows.len(), 2);
    }
}

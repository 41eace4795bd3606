//! Study identifiers and the per-run copy manifest.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::SyncWarning;

/// Name of a study: an archive subdirectory and the last segment of an allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudyId(CompactString);

impl StudyId {
    /// Create a study id from a name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(CompactString::new(name))
    }

    /// The study name.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for StudyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StudyId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for StudyId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for StudyId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A single file scheduled for copying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCopyTask {
    /// File in the archive.
    pub source: PathBuf,
    /// Where the file lands under the target root.
    pub destination: PathBuf,
    /// Study the file belongs to.
    pub study: StudyId,
    /// Size in bytes at scan time.
    pub size: u64,
}

impl FileCopyTask {
    /// Derive a task by re-rooting `source` from `archive_root` to `target_root`.
    ///
    /// Returns `None` if `source` is not strictly below a study directory of
    /// `archive_root`. The study is the first path component below the archive
    /// root, and everything from the study segment down is kept verbatim.
    pub fn derive(source: &Path, archive_root: &Path, target_root: &Path, size: u64) -> Option<Self> {
        let relative = source.strip_prefix(archive_root).ok()?;
        let mut components = relative.components();
        let study = components.next()?.as_os_str().to_str()?;
        if components.next().is_none() {
            return None;
        }

        Some(Self {
            source: source.to_path_buf(),
            destination: target_root.join(relative),
            study: StudyId::new(study),
            size,
        })
    }
}

/// Changed files grouped by study. Built once per run and consumed by the copy step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyManifest {
    studies: BTreeMap<StudyId, Vec<FileCopyTask>>,
}

impl StudyManifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to its study's list, preserving insertion order.
    pub fn push(&mut self, task: FileCopyTask) {
        self.studies.entry(task.study.clone()).or_default().push(task);
    }

    /// Tasks for a study, if it has any changed files.
    pub fn get(&self, study: &str) -> Option<&[FileCopyTask]> {
        self.studies.get(study).map(Vec::as_slice)
    }

    /// Whether the study has any changed files.
    pub fn contains(&self, study: &str) -> bool {
        self.studies.contains_key(study)
    }

    /// Studies with changed files, sorted by name.
    pub fn studies(&self) -> impl Iterator<Item = &StudyId> {
        self.studies.keys()
    }

    /// Iterate over (study, tasks) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&StudyId, &[FileCopyTask])> {
        self.studies.iter().map(|(id, tasks)| (id, tasks.as_slice()))
    }

    /// Number of studies in the manifest.
    pub fn len(&self) -> usize {
        self.studies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.studies.is_empty()
    }

    /// Total number of tasks across all studies.
    pub fn task_count(&self) -> usize {
        self.studies.values().map(Vec::len).sum()
    }
}

/// Result of scanning the selected study directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Changed files grouped by study.
    pub manifest: StudyManifest,
    /// Number of changed files found.
    pub total_files: u64,
    /// Combined size of changed files.
    pub total_bytes: u64,
    /// Entries that were skipped.
    pub warnings: Vec<SyncWarning>,
    /// Time taken to scan.
    pub scan_duration: Duration,
}

impl ScanReport {
    /// Whether the scan found nothing to copy.
    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }
}

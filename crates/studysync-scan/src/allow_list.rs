//! Allow-list parsing and resolution against the archive.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use studysync_core::{StudyId, SyncError};

/// Studies authorized for transfer, as read from an allow-list file.
///
/// Each line holds one or more comma-separated `Investigator/StudyName`
/// entries. Only the segment after the last `/` is kept, so entries naming
/// the same study under different investigators collapse into one id.
#[derive(Debug, Clone)]
pub struct AllowList {
    path: PathBuf,
    studies: BTreeSet<StudyId>,
}

impl AllowList {
    /// Read and parse an allow-list file.
    ///
    /// Fails if the file cannot be read or names no study.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| SyncError::allow_list(&path, e))?;
        let studies = Self::parse(&text);

        if studies.is_empty() {
            return Err(SyncError::AllowListEmpty { path });
        }

        debug!(path = %path.display(), count = studies.len(), "Loaded allow-list");
        Ok(Self { path, studies })
    }

    /// Parse allow-list text into a set of study ids.
    pub fn parse(text: &str) -> BTreeSet<StudyId> {
        text.lines()
            .flat_map(|line| line.split(','))
            .filter_map(study_of_entry)
            .map(StudyId::new)
            .collect()
    }

    /// File this list was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the list names a study.
    pub fn contains(&self, study: &str) -> bool {
        self.studies.contains(study)
    }

    /// Study ids, sorted.
    pub fn iter(&self) -> impl Iterator<Item = &StudyId> {
        self.studies.iter()
    }

    pub fn len(&self) -> usize {
        self.studies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.studies.is_empty()
    }
}

/// Extract the study name from a single `Investigator/StudyName` entry.
fn study_of_entry(entry: &str) -> Option<&str> {
    let entry = entry.trim().trim_end_matches('/');
    let study = entry.rsplit('/').next()?.trim();
    (!study.is_empty()).then_some(study)
}

/// A study directory selected for scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStudy {
    pub id: StudyId,
    /// Absolute path of the study directory.
    pub path: PathBuf,
}

/// First allow-list pass: keeps allow-listed studies that exist as archive directories.
#[derive(Debug, Clone)]
pub struct AllowListResolver {
    archive_root: PathBuf,
}

impl AllowListResolver {
    /// Create a resolver for an archive root.
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
        }
    }

    /// Intersect the allow-list with the study directories present in the archive.
    ///
    /// An empty result is not an error; callers treat it as nothing to do.
    pub fn resolve(&self, allow_list_path: &Path) -> Result<Vec<ResolvedStudy>, SyncError> {
        let allow_list = AllowList::load(allow_list_path)?;
        self.resolve_with(&allow_list)
    }

    /// Same as [`resolve`](Self::resolve) with an already loaded list.
    pub fn resolve_with(&self, allow_list: &AllowList) -> Result<Vec<ResolvedStudy>, SyncError> {
        let present = list_study_dirs(&self.archive_root)?;
        info!(
            "Found {} study directories in {}",
            present.len(),
            self.archive_root.display()
        );

        let resolved: Vec<ResolvedStudy> = present
            .into_iter()
            .filter(|name| allow_list.contains(name))
            .map(|name| ResolvedStudy {
                path: self.archive_root.join(&name),
                id: StudyId::new(name),
            })
            .collect();

        debug!(
            allow_list = %allow_list.path().display(),
            matched = resolved.len(),
            "Resolved allow-list against archive"
        );
        Ok(resolved)
    }
}

/// Names of the immediate subdirectories of the archive root, sorted.
pub fn list_study_dirs(archive_root: &Path) -> Result<Vec<String>, SyncError> {
    let entries = std::fs::read_dir(archive_root).map_err(|e| SyncError::archive(archive_root, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!(error = %err, "Skipping unreadable archive entry");
                continue;
            }
        };

        // Follows symlinks, so linked study directories count
        if !entry.path().is_dir() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => debug!(?name, "Skipping non UTF-8 study directory"),
        }
    }

    names.sort();
    Ok(names)
}

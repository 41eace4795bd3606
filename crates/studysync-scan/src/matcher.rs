//! Second allow-list pass over the scan manifest.

use std::path::PathBuf;

use tracing::{debug, info};

use studysync_core::{StudyId, StudyManifest, SyncError};

use crate::allow_list::AllowList;

/// Gates copying: only studies named by the allow-list *and* present in the
/// manifest are copied.
///
/// The allow-list is read again here instead of reusing the first pass. The
/// resolver checks that a study directory exists; this pass checks that the
/// study actually has changed files, since an allow-listed study can have
/// none inside the window.
#[derive(Debug, Clone)]
pub struct StudyMatcher {
    allow_list_path: PathBuf,
}

impl StudyMatcher {
    pub fn new(allow_list_path: impl Into<PathBuf>) -> Self {
        Self {
            allow_list_path: allow_list_path.into(),
        }
    }

    /// Re-read the allow-list and return the studies to copy, sorted.
    pub fn match_studies(&self, manifest: &StudyManifest) -> Result<Vec<StudyId>, SyncError> {
        let allow_list = AllowList::load(&self.allow_list_path)?;
        let matched = match_manifest(&allow_list, manifest);
        info!(
            submitted = allow_list.len(),
            matched = matched.len(),
            "Matched allow-list against changed studies"
        );
        Ok(matched)
    }
}

/// Studies present in both the allow-list and the manifest.
pub fn match_manifest(allow_list: &AllowList, manifest: &StudyManifest) -> Vec<StudyId> {
    allow_list
        .iter()
        .filter(|study| {
            let found = manifest.contains(study.as_str());
            if !found {
                debug!(study = %study, "No changed files for allow-listed study");
            }
            found
        })
        .cloned()
        .collect()
}

//! Copy of matched studies into the target tree.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::{debug, info, warn};

use studysync_core::{FileCopyTask, OwnershipScope, StudyId, StudyManifest, SyncError, SyncWarning};

use crate::ownership::OwnershipNormalizer;
use crate::progress::{CopyProgress, CopyReport};

/// Copies manifest tasks, best-effort per file.
///
/// A file that cannot be copied is recorded and skipped. A destination
/// directory that cannot be created aborts the copy, as does a refused
/// ownership change.
#[derive(Debug, Clone)]
pub struct CopyExecutor {
    target_root: PathBuf,
    normalizer: Option<OwnershipNormalizer>,
    scope: OwnershipScope,
}

impl CopyExecutor {
    /// Create an executor that leaves ownership alone.
    pub fn new(target_root: impl Into<PathBuf>) -> Self {
        Self {
            target_root: target_root.into(),
            normalizer: None,
            scope: OwnershipScope::Off,
        }
    }

    /// Re-own copied files with `normalizer` over the given scope.
    pub fn with_ownership(mut self, normalizer: OwnershipNormalizer, scope: OwnershipScope) -> Self {
        self.normalizer = Some(normalizer);
        self.scope = scope;
        self
    }

    /// Copy the tasks of the given studies.
    pub fn execute(
        &self,
        manifest: &StudyManifest,
        studies: &[StudyId],
    ) -> Result<CopyReport, SyncError> {
        self.execute_with_progress(manifest, studies, |_| {})
    }

    /// Copy the tasks of the given studies, reporting after each file.
    pub fn execute_with_progress<F>(
        &self,
        manifest: &StudyManifest,
        studies: &[StudyId],
        mut on_progress: F,
    ) -> Result<CopyReport, SyncError>
    where
        F: FnMut(&CopyProgress),
    {
        let selected: Vec<(&StudyId, &[FileCopyTask])> = studies
            .iter()
            .filter_map(|study| manifest.get(study.as_str()).map(|tasks| (study, tasks)))
            .collect();
        let files_total: usize = selected.iter().map(|(_, tasks)| tasks.len()).sum();
        let bytes_total: u64 = selected
            .iter()
            .flat_map(|(_, tasks)| tasks.iter())
            .map(|t| t.size)
            .sum();

        let mut progress = CopyProgress::new(files_total, bytes_total);
        let mut report = CopyReport::default();

        for (study, tasks) in selected {
            progress.set_current_study(study);
            let mut copied_any = false;

            for task in tasks {
                ensure_parent(&task.destination)?;

                match copy_file(&task.source, &task.destination) {
                    Ok(bytes) => {
                        debug!(
                            source = %task.source.display(),
                            destination = %task.destination.display(),
                            "Copied file"
                        );
                        copied_any = true;
                        report.files_copied.push(task.destination.clone());
                        report.bytes_copied += bytes;
                        progress.complete_file(task.destination.clone(), bytes);

                        if self.scope == OwnershipScope::Tree {
                            report.ownership_changes += self.normalize(&self.target_root)?;
                        }
                    }
                    Err(err) => {
                        warn!(source = %task.source.display(), error = %err, "Skipping file");
                        report.failures.push(SyncWarning::copy_failed(&task.source, &err));
                        progress.fail_file(task.destination.clone());
                    }
                }

                on_progress(&progress);
            }

            if copied_any {
                if self.scope == OwnershipScope::Study {
                    report.ownership_changes += self.normalize_study(study)?;
                }
                report.studies_copied.push(study.clone());
            }
        }

        info!(
            files = report.files_copied.len(),
            bytes = report.bytes_copied,
            failed = report.failures.len(),
            "Copy finished"
        );
        Ok(report)
    }

    fn normalize(&self, root: &Path) -> Result<u64, SyncError> {
        match &self.normalizer {
            Some(normalizer) => normalizer.normalize(root, true),
            None => Ok(0),
        }
    }

    /// Re-own a study subtree and the target root above it.
    fn normalize_study(&self, study: &StudyId) -> Result<u64, SyncError> {
        let Some(normalizer) = &self.normalizer else {
            return Ok(0);
        };
        let root = normalizer.normalize(&self.target_root, false)?;
        let subtree = normalizer.normalize(&self.target_root.join(study.as_str()), true)?;
        Ok(root + subtree)
    }
}

/// Create the destination's parent directories. Existing directories are fine.
fn ensure_parent(destination: &Path) -> Result<(), SyncError> {
    let Some(parent) = destination.parent() else {
        return Ok(());
    };
    fs::create_dir_all(parent).map_err(|source| SyncError::DestinationDir {
        path: parent.to_path_buf(),
        source,
    })
}

/// Copy a single file, overwriting the destination and keeping permissions and times.
fn copy_file(source: &Path, destination: &Path) -> std::io::Result<u64> {
    let metadata = fs::metadata(source)?;

    let bytes = fs::copy(source, destination)?;

    filetime::set_file_times(
        destination,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )?;

    Ok(bytes)
}

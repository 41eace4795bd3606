//! Recency scanner over the selected study directories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jwalk::{Parallelism, WalkDir};
use tracing::{debug, info, warn};

use studysync_core::{FileCopyTask, ScanReport, StudyManifest, SyncError, SyncWarning, WarningKind};

/// Time window a file's modification time must fall in to be copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    /// Instant the window ends at, normally the start of the run.
    pub reference_time: SystemTime,
    /// How far back from the reference time the window reaches.
    pub lookback: Duration,
}

impl ScanWindow {
    /// A window ending now.
    pub fn new(lookback: Duration) -> Self {
        Self::ending_at(SystemTime::now(), lookback)
    }

    /// A window ending at a fixed reference time.
    pub fn ending_at(reference_time: SystemTime, lookback: Duration) -> Self {
        Self {
            reference_time,
            lookback,
        }
    }

    /// Earliest modification time still inside the window.
    pub fn cutoff(&self) -> SystemTime {
        self.reference_time
            .checked_sub(self.lookback)
            .unwrap_or(UNIX_EPOCH)
    }

    /// Whether a modification time is inside the window. The cutoff is inclusive.
    pub fn contains(&self, modified: SystemTime) -> bool {
        modified >= self.cutoff()
    }
}

/// Walks study directories and collects files changed inside the window.
///
/// The archive is written by a live server, so entries can disappear at any
/// point during the walk. Vanished entries are skipped silently; other read
/// errors are recorded as warnings and the affected entry or subtree skipped.
#[derive(Debug, Clone)]
pub struct ChangeScanner {
    archive_root: PathBuf,
    target_root: PathBuf,
    window: ScanWindow,
}

impl ChangeScanner {
    /// Create a scanner mapping files from `archive_root` onto `target_root`.
    pub fn new(
        archive_root: impl Into<PathBuf>,
        target_root: impl Into<PathBuf>,
        window: ScanWindow,
    ) -> Self {
        Self {
            archive_root: archive_root.into(),
            target_root: target_root.into(),
            window,
        }
    }

    /// Scan the given study directories.
    pub fn scan<P: AsRef<Path>>(&self, study_paths: &[P]) -> Result<ScanReport, SyncError> {
        let start = Instant::now();
        if !self.archive_root.is_dir() {
            return Err(SyncError::ArchiveRootMissing {
                path: self.archive_root.clone(),
            });
        }

        let mut manifest = StudyManifest::new();
        let mut warnings = Vec::new();
        let mut total_files: u64 = 0;
        let mut total_bytes: u64 = 0;

        for study_path in study_paths {
            let study_path = study_path.as_ref();
            debug!(study = %study_path.display(), "Scanning study");
            self.scan_study(
                study_path,
                &mut manifest,
                &mut warnings,
                &mut total_files,
                &mut total_bytes,
            );
        }

        info!(
            files = total_files,
            bytes = total_bytes,
            studies = manifest.len(),
            "Found {} file(s) changed within {:?}",
            total_files,
            self.window.lookback
        );

        Ok(ScanReport {
            manifest,
            total_files,
            total_bytes,
            warnings,
            scan_duration: start.elapsed(),
        })
    }

    fn scan_study(
        &self,
        study_path: &Path,
        manifest: &mut StudyManifest,
        warnings: &mut Vec<SyncWarning>,
        total_files: &mut u64,
        total_bytes: &mut u64,
    ) {
        // Depth 0 is yielded so a study root that cannot be listed is reported
        let walker = WalkDir::new(study_path)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(false)
            .sort(true)
            .min_depth(0);

        for entry_result in walker {
            let mut entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    if !is_vanished(&err) {
                        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                        warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
                        warnings.push(SyncWarning::new(path, err.to_string(), WarningKind::ReadError));
                    }
                    continue;
                }
            };

            if let Some(err) = entry.read_children_error.take() {
                if !is_vanished(&err) {
                    let path = entry.path();
                    warn!(path = %path.display(), error = %err, "Skipping unreadable directory");
                    warnings.push(SyncWarning::new(path, err.to_string(), WarningKind::ReadError));
                }
            }

            if entry.depth == 0 {
                continue;
            }

            let path = entry.path();

            // Follows symlinks, matching what a copy of the path would read
            let metadata = match std::fs::metadata(&path) {
                Ok(m) => m,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Cannot stat entry");
                    warnings.push(SyncWarning::metadata(&path, &err));
                    continue;
                }
            };

            if metadata.is_dir() {
                continue;
            }

            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(err) => {
                    warnings.push(SyncWarning::metadata(&path, &err));
                    continue;
                }
            };

            if !self.window.contains(modified) {
                continue;
            }

            let size = metadata.len();
            let Some(task) = FileCopyTask::derive(&path, &self.archive_root, &self.target_root, size)
            else {
                debug!(path = %path.display(), "Changed file is outside any study, skipping");
                continue;
            };

            *total_files += 1;
            *total_bytes += size;
            manifest.push(task);
        }
    }
}

fn is_vanished(err: &jwalk::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::fs;
    use tempfile::TempDir;

    const HOUR: u64 = 60 * 60;

    fn touch(path: &Path, contents: &str, mtime: SystemTime) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        filetime::set_file_mtime(path, FileTime::from_system_time(mtime)).unwrap();
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let now = SystemTime::now();
        let window = ScanWindow::ending_at(now, Duration::from_secs(24 * HOUR));
        let cutoff = window.cutoff();

        assert!(window.contains(cutoff));
        assert!(window.contains(now));
        assert!(!window.contains(cutoff - Duration::from_secs(1)));
    }

    #[test]
    fn test_window_saturates_at_epoch() {
        let window = ScanWindow::ending_at(UNIX_EPOCH + Duration::from_secs(10), Duration::from_secs(100));
        assert_eq!(window.cutoff(), UNIX_EPOCH);
    }

    #[test]
    fn test_scan_selects_recent_files() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("archive");
        let now = SystemTime::now();

        touch(&archive.join("StudyX/img1.dcm"), "recent", now - Duration::from_secs(2 * HOUR));
        touch(&archive.join("StudyX/img2.dcm"), "old", now - Duration::from_secs(72 * HOUR));
        touch(&archive.join("StudyX/sub/img3.dcm"), "nested", now);

        let scanner = ChangeScanner::new(
            &archive,
            temp.path().join("target"),
            ScanWindow::ending_at(now, Duration::from_secs(24 * HOUR)),
        );
        let report = scanner.scan(&[archive.join("StudyX")]).unwrap();

        assert_eq!(report.total_files, 2);
        assert_eq!(report.total_bytes, ("recent".len() + "nested".len()) as u64);
        let tasks = report.manifest.get("StudyX").unwrap();
        let names: Vec<_> = tasks
            .iter()
            .map(|t| t.source.strip_prefix(&archive).unwrap().to_path_buf())
            .collect();
        assert!(names.contains(&PathBuf::from("StudyX/img1.dcm")));
        assert!(names.contains(&PathBuf::from("StudyX/sub/img3.dcm")));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_scan_missing_study_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let scanner = ChangeScanner::new(
            temp.path(),
            temp.path().join("target"),
            ScanWindow::new(Duration::from_secs(HOUR)),
        );

        let report = scanner.scan(&[temp.path().join("Vanished")]).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.total_files, 0);
    }

    #[test]
    fn test_scan_includes_hidden_files() {
        let temp = TempDir::new().unwrap();
        let now = SystemTime::now();
        touch(&temp.path().join("S/.hidden.dcm"), "h", now);

        let scanner = ChangeScanner::new(
            temp.path(),
            temp.path().join("target"),
            ScanWindow::ending_at(now, Duration::from_secs(HOUR)),
        );
        let report = scanner.scan(&[temp.path().join("S")]).unwrap();
        assert_eq!(report.total_files, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_study_root_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        if rustix::process::geteuid().is_root() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let now = SystemTime::now();
        touch(&temp.path().join("S/img.dcm"), "x", now);
        let study = temp.path().join("S");
        fs::set_permissions(&study, fs::Permissions::from_mode(0o000)).unwrap();

        let scanner = ChangeScanner::new(
            temp.path(),
            temp.path().join("target"),
            ScanWindow::ending_at(now, Duration::from_secs(HOUR)),
        );
        let report = scanner.scan(&[&study]);
        fs::set_permissions(&study, fs::Permissions::from_mode(0o755)).unwrap();

        let report = report.unwrap();
        assert_eq!(report.total_files, 0);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::ReadError);
        assert_eq!(report.warnings[0].path, study);
    }
}

//! Progress reporting for the copy step.

use std::path::PathBuf;

use studysync_core::{StudyId, SyncWarning};

/// Progress information for an ongoing copy.
#[derive(Debug, Clone)]
pub struct CopyProgress {
    /// Number of files handled so far, copied or failed.
    pub files_completed: usize,
    /// Total number of files to copy.
    pub files_total: usize,
    /// Number of bytes copied so far.
    pub bytes_processed: u64,
    /// Total bytes to copy, from scan-time sizes.
    pub bytes_total: u64,
    /// Study currently being copied.
    pub current_study: Option<StudyId>,
    /// Destination of the file just handled.
    pub current_file: Option<PathBuf>,
    /// Files skipped so far.
    pub errors: usize,
}

impl CopyProgress {
    /// Create a new progress tracker.
    pub fn new(files_total: usize, bytes_total: u64) -> Self {
        Self {
            files_completed: 0,
            files_total,
            bytes_processed: 0,
            bytes_total,
            current_study: None,
            current_file: None,
            errors: 0,
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.bytes_total > 0 {
            (self.bytes_processed as f64 / self.bytes_total as f64) * 100.0
        } else if self.files_total > 0 {
            (self.files_completed as f64 / self.files_total as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn set_current_study(&mut self, study: &StudyId) {
        self.current_study = Some(study.clone());
    }

    /// Increment the completed count and add bytes.
    pub fn complete_file(&mut self, destination: PathBuf, bytes: u64) {
        self.files_completed += 1;
        self.bytes_processed += bytes;
        self.current_file = Some(destination);
    }

    pub fn fail_file(&mut self, destination: PathBuf) {
        self.files_completed += 1;
        self.errors += 1;
        self.current_file = Some(destination);
    }
}

/// Result of the copy step.
#[derive(Debug, Clone, Default)]
pub struct CopyReport {
    /// Destination paths written, in copy order.
    pub files_copied: Vec<PathBuf>,
    /// Bytes written.
    pub bytes_copied: u64,
    /// Studies with at least one file copied.
    pub studies_copied: Vec<StudyId>,
    /// Files that could not be copied.
    pub failures: Vec<SyncWarning>,
    /// Entries re-owned after copying.
    pub ownership_changes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_prefers_bytes() {
        let mut progress = CopyProgress::new(4, 200);
        progress.complete_file(PathBuf::from("/t/a"), 50);
        assert_eq!(progress.percentage(), 25.0);

        let mut progress = CopyProgress::new(4, 0);
        progress.fail_file(PathBuf::from("/t/a"));
        assert_eq!(progress.percentage(), 25.0);
        assert_eq!(progress.errors, 1);
    }

    #[test]
    fn test_empty_progress() {
        assert_eq!(CopyProgress::new(0, 0).percentage(), 0.0);
    }
}

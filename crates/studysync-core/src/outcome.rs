//! Run results.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SyncWarning;
use crate::manifest::StudyId;

/// Why a run ended without copying anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoWorkReason {
    /// No allow-listed study exists in the archive.
    NoMatchingStudies,
    /// Matching studies had no files inside the lookback window.
    NoChangedFiles,
    /// Changed studies were not named by the allow-list on the second pass.
    NoAuthorizedChanges,
}

impl fmt::Display for NoWorkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingStudies => write!(f, "no allow-listed study exists in the archive"),
            Self::NoChangedFiles => write!(f, "no files changed within the lookback window"),
            Self::NoAuthorizedChanges => write!(f, "no changed study is on the allow-list"),
        }
    }
}

/// Aggregate result of a run that found work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyRunResult {
    /// Changed files found by the scan.
    pub files_considered: u64,
    /// Combined size of the changed files.
    pub total_bytes: u64,
    /// Allow-listed studies present in the archive.
    pub studies_resolved: Vec<StudyId>,
    /// Studies gated in by the second allow-list pass.
    pub studies_matched: Vec<StudyId>,
    /// Studies with at least one file copied.
    pub studies_copied: Vec<StudyId>,
    /// Destination paths written.
    pub files_copied: Vec<PathBuf>,
    /// Bytes written.
    pub bytes_copied: u64,
    /// Files skipped during the copy.
    pub failures: Vec<SyncWarning>,
    /// Entries skipped during the scan.
    pub scan_warnings: Vec<SyncWarning>,
    /// Target entries whose owner was changed.
    pub ownership_changes: u64,
    /// Whether the copy step was skipped.
    pub dry_run: bool,
    pub elapsed: Duration,
}

impl CopyRunResult {
    /// Whether every selected file was copied.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Get a human-readable summary of the run.
    pub fn summary(&self) -> String {
        let action = if self.dry_run { "Would copy" } else { "Copied" };
        if self.failures.is_empty() {
            format!(
                "{} {} files from {} studies",
                action,
                self.files_copied.len(),
                self.studies_copied.len()
            )
        } else {
            format!(
                "{} {} files from {} studies, {} failed",
                action,
                self.files_copied.len(),
                self.studies_copied.len(),
                self.failures.len()
            )
        }
    }
}

/// Terminal state of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Files were selected (and copied unless dry-running).
    Completed(CopyRunResult),
    /// Nothing to do.
    NoWork(NoWorkReason),
}

impl RunOutcome {
    pub fn is_no_work(&self) -> bool {
        matches!(self, Self::NoWork(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarningKind;

    #[test]
    fn test_summary() {
        let mut result = CopyRunResult {
            files_copied: vec![PathBuf::from("/t/A/1"), PathBuf::from("/t/A/2")],
            studies_copied: vec![StudyId::new("A")],
            ..Default::default()
        };
        assert!(result.is_success());
        assert_eq!(result.summary(), "Copied 2 files from 1 studies");

        result
            .failures
            .push(SyncWarning::new("/a/A/3", "gone", WarningKind::Vanished));
        assert!(!result.is_success());
        assert!(result.summary().ends_with("1 failed"));
    }

    #[test]
    fn test_no_work_display() {
        let outcome = RunOutcome::NoWork(NoWorkReason::NoChangedFiles);
        assert!(outcome.is_no_work());
        assert!(NoWorkReason::NoMatchingStudies.to_string().contains("allow-listed"));
    }
}

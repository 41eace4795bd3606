//! Allow-list resolution and change scanning for studysync.
//!
//! Selection happens in three steps:
//!
//! 1. [`AllowListResolver`] intersects the allow-list with the study
//!    directories present in the archive root.
//! 2. [`ChangeScanner`] walks each selected study and collects the files
//!    modified inside the lookback window into a [`StudyManifest`].
//! 3. [`StudyMatcher`] reads the allow-list again and keeps the manifest
//!    studies it names.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::time::Duration;
//!
//! use studysync_scan::{AllowListResolver, ChangeScanner, ScanWindow, StudyMatcher};
//!
//! let allow_list = Path::new("/data/xnat/scripts/studies.txt");
//! let studies = AllowListResolver::new("/data/xnat/archive").resolve(allow_list).unwrap();
//! let paths: Vec<_> = studies.iter().map(|s| s.path.clone()).collect();
//!
//! let window = ScanWindow::new(Duration::from_secs(24 * 60 * 60));
//! let report = ChangeScanner::new("/data/xnat/archive", "/netappcifs", window)
//!     .scan(&paths)
//!     .unwrap();
//!
//! let matched = StudyMatcher::new(allow_list).match_studies(&report.manifest).unwrap();
//! println!("{} changed files, {} studies to copy", report.total_files, matched.len());
//! ```

mod allow_list;
mod matcher;
mod scanner;

pub use allow_list::{AllowList, AllowListResolver, ResolvedStudy, list_study_dirs};
pub use matcher::{StudyMatcher, match_manifest};
pub use scanner::{ChangeScanner, ScanWindow};

// Re-export core types for convenience
pub use studysync_core::{
    FileCopyTask, ScanReport, StudyId, StudyManifest, SyncError, SyncWarning, WarningKind,
};

//! One sync run: resolve, scan, match, copy, normalize.

use std::path::PathBuf;
use std::time::{Instant, SystemTime};

use tracing::info;

use studysync_core::{
    CopyRunResult, NoWorkReason, OwnershipScope, RunOutcome, ScanReport, StudyId, SyncConfig,
    SyncError,
};
use studysync_scan::{AllowListResolver, ChangeScanner, ResolvedStudy, ScanWindow, StudyMatcher};

use crate::copy::CopyExecutor;
use crate::fetch::fetch_allow_list;
use crate::ownership::OwnershipNormalizer;
use crate::progress::CopyProgress;

/// Selection made by a run before anything is copied.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Studies and files to copy.
    Ready {
        resolved: Vec<ResolvedStudy>,
        scan: ScanReport,
        matched: Vec<StudyId>,
    },
    /// Nothing to copy.
    NoWork(NoWorkReason),
}

/// A single sync run over a configuration.
#[derive(Debug, Clone)]
pub struct SyncRun {
    config: SyncConfig,
    reference_time: Option<SystemTime>,
}

impl SyncRun {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            reference_time: None,
        }
    }

    /// End the lookback window at a fixed time instead of the time of planning.
    pub fn with_reference_time(mut self, reference_time: SystemTime) -> Self {
        self.reference_time = Some(reference_time);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Normalizer for the configured owner, unless ownership is left alone.
    pub fn normalizer(&self) -> Option<OwnershipNormalizer> {
        (self.config.ownership_scope != OwnershipScope::Off && !self.config.dry_run)
            .then(|| OwnershipNormalizer::new(self.config.owner_uid, self.config.owner_gid))
    }

    /// Fetch the allow-list if a repository is configured. Returns the list in use.
    pub fn fetch(&self) -> Result<PathBuf, SyncError> {
        match &self.config.fetch {
            Some(fetch) => fetch_allow_list(fetch, self.normalizer().as_ref()),
            None => Ok(self.config.allow_list.clone()),
        }
    }

    /// Resolve the allow-list and scan the studies found, without matching.
    ///
    /// When no allow-listed study exists in the archive the report is empty.
    pub fn scan(&self) -> Result<(Vec<ResolvedStudy>, ScanReport), SyncError> {
        self.config.validate()?;
        let allow_list = self.config.effective_allow_list();
        let resolved = AllowListResolver::new(&self.config.archive_root).resolve(&allow_list)?;

        let window = ScanWindow::ending_at(
            self.reference_time.unwrap_or_else(SystemTime::now),
            self.config.lookback(),
        );
        let paths: Vec<PathBuf> = resolved.iter().map(|s| s.path.clone()).collect();
        let scan = ChangeScanner::new(&self.config.archive_root, &self.config.target_root, window)
            .scan(&paths)?;
        Ok((resolved, scan))
    }

    /// Resolve, scan and match without copying.
    pub fn plan(&self) -> Result<Plan, SyncError> {
        let (resolved, scan) = self.scan()?;
        if resolved.is_empty() {
            return Ok(Plan::NoWork(NoWorkReason::NoMatchingStudies));
        }
        if scan.is_empty() {
            return Ok(Plan::NoWork(NoWorkReason::NoChangedFiles));
        }

        let matched = StudyMatcher::new(self.config.effective_allow_list())
            .match_studies(&scan.manifest)?;
        if matched.is_empty() {
            return Ok(Plan::NoWork(NoWorkReason::NoAuthorizedChanges));
        }

        Ok(Plan::Ready {
            resolved,
            scan,
            matched,
        })
    }

    /// Run every step, fetching the allow-list first when configured.
    pub fn execute(&self) -> Result<RunOutcome, SyncError> {
        self.execute_with_progress(|_| {})
    }

    /// Run every step, reporting copy progress after each file.
    pub fn execute_with_progress<F>(&self, on_progress: F) -> Result<RunOutcome, SyncError>
    where
        F: FnMut(&CopyProgress),
    {
        let start = Instant::now();
        self.config.validate()?;
        self.fetch()?;

        let (resolved, scan, matched) = match self.plan()? {
            Plan::Ready {
                resolved,
                scan,
                matched,
            } => (resolved, scan, matched),
            Plan::NoWork(reason) => {
                info!(%reason, "Nothing to copy");
                return Ok(RunOutcome::NoWork(reason));
            }
        };

        let mut result = CopyRunResult {
            files_considered: scan.total_files,
            total_bytes: scan.total_bytes,
            studies_resolved: resolved.into_iter().map(|s| s.id).collect(),
            studies_matched: matched.clone(),
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        if self.config.dry_run {
            for study in &matched {
                if let Some(tasks) = scan.manifest.get(study.as_str()) {
                    result.files_copied.extend(tasks.iter().map(|t| t.destination.clone()));
                    result.bytes_copied += tasks.iter().map(|t| t.size).sum::<u64>();
                }
            }
            result.studies_copied = matched;
        } else {
            let mut executor = CopyExecutor::new(&self.config.target_root);
            if let Some(normalizer) = self.normalizer() {
                executor = executor.with_ownership(normalizer, self.config.ownership_scope);
            }
            let report = executor.execute_with_progress(&scan.manifest, &matched, on_progress)?;
            result.files_copied = report.files_copied;
            result.bytes_copied = report.bytes_copied;
            result.studies_copied = report.studies_copied;
            result.failures = report.failures;
            result.ownership_changes = report.ownership_changes;
        }

        result.scan_warnings = scan.warnings;
        result.elapsed = start.elapsed();
        info!("{}", result.summary());
        Ok(RunOutcome::Completed(result))
    }
}

//! Core types for studysync.
//!
//! This crate provides the data structures shared by the scan and copy
//! stages: configuration, the error taxonomy, the per-run study manifest
//! and run outcomes.

mod config;
mod error;
mod manifest;
mod outcome;

pub use config::{
    DEFAULT_LOOKBACK_SECS, DEFAULT_OWNER_ID, FetchConfig, FetchConfigBuilder, OwnershipScope,
    SyncConfig, SyncConfigBuilder,
};
pub use error::{ErrorClass, SyncError, SyncWarning, WarningKind};
pub use manifest::{FileCopyTask, ScanReport, StudyId, StudyManifest};
pub use outcome::{CopyRunResult, NoWorkReason, RunOutcome};

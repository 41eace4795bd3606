//! Error and warning types for sync runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad class of a [`SyncError`], used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Allow-list or archive configuration is missing or unusable.
    Configuration,
    /// The run cannot continue because of an I/O failure.
    FatalIo,
    /// Ownership could not be changed.
    Permission,
}

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The allow-list file could not be opened or read.
    #[error("Cannot read allow-list {path}: {source}")]
    AllowListUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The allow-list file contains no study entries.
    #[error("Allow-list is empty: {path}")]
    AllowListEmpty { path: PathBuf },

    /// The archive root does not exist or is not a directory.
    #[error("Archive root not found: {path}")]
    ArchiveRootMissing { path: PathBuf },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The configuration file could not be opened or read.
    #[error("Cannot read configuration {path}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive root exists but cannot be enumerated.
    #[error("Cannot enumerate archive root {path}: {source}")]
    ArchiveUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A destination directory could not be created.
    #[error("Failed to create destination directory {path}: {source}")]
    DestinationDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Changing ownership was refused by the operating system.
    #[error("Permission denied changing ownership of {path}")]
    OwnershipDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote allow-list could not be fetched.
    #[error("Failed to fetch allow-list from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SyncError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify an error raised while reading the allow-list.
    pub fn allow_list(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::AllowListUnreadable {
            path: path.into(),
            source,
        }
    }

    /// Classify an error raised while listing the archive root.
    pub fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory => {
                Self::ArchiveRootMissing { path }
            }
            _ => Self::ArchiveUnreadable { path, source },
        }
    }

    /// Classify an error raised while changing ownership.
    pub fn ownership(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::OwnershipDenied { path, source },
            _ => Self::Io { path, source },
        }
    }

    /// The taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AllowListUnreadable { .. }
            | Self::AllowListEmpty { .. }
            | Self::ArchiveRootMissing { .. }
            | Self::InvalidConfig { .. }
            | Self::ConfigUnreadable { .. }
            | Self::Fetch { .. } => ErrorClass::Configuration,
            Self::ArchiveUnreadable { .. } | Self::DestinationDir { .. } | Self::Io { .. } => {
                ErrorClass::FatalIo
            }
            Self::OwnershipDenied { .. } => ErrorClass::Permission,
        }
    }
}

/// Kind of non-fatal warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Entry disappeared between enumeration and use.
    Vanished,
    /// Error reading a directory.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// A single file could not be copied.
    CopyFailed,
}

/// Non-fatal problem recorded during a run. The affected entry is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl SyncWarning {
    /// Create a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a metadata warning, classifying vanished entries separately.
    pub fn metadata(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let kind = if error.kind() == std::io::ErrorKind::NotFound {
            WarningKind::Vanished
        } else {
            WarningKind::MetadataError
        };
        Self::new(path, format!("Metadata error: {error}"), kind)
    }

    /// Create a copy failure warning.
    pub fn copy_failed(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let kind = if error.kind() == std::io::ErrorKind::NotFound {
            WarningKind::Vanished
        } else {
            WarningKind::CopyFailed
        };
        Self::new(path, format!("Copy failed: {error}"), kind)
    }
}

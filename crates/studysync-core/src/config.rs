//! Sync run configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Default lookback window: one day.
pub const DEFAULT_LOOKBACK_SECS: u64 = 24 * 60 * 60;

/// uid/gid of the account the downstream XNAT service runs as.
pub const DEFAULT_OWNER_ID: u32 = 1001;

/// Which part of the target tree is re-owned after copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnershipScope {
    /// The whole target tree, after every copied file.
    #[default]
    Tree,
    /// Each copied study's subtree, once after its files are copied.
    Study,
    /// Leave ownership untouched.
    Off,
}

/// Where to fetch the allow-list from before a run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct FetchConfig {
    /// Git repository URL.
    pub repository: String,

    /// Branch to clone.
    #[builder(default = "\"main\".to_string()")]
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Name of the allow-list file inside the repository.
    #[builder(default = "\"xnat_Carle2Illinois.txt\".to_string()")]
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Directory the allow-list file is moved into.
    #[builder(default = "PathBuf::from(\"/data/xnat/scripts\")")]
    #[serde(default = "default_fetch_destination")]
    pub destination: PathBuf,

    /// Clone depth (0 = full history).
    #[builder(default = "1")]
    #[serde(default = "default_depth")]
    pub depth: i32,
}

impl FetchConfig {
    /// Create a new fetch config builder.
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::default()
    }

    /// Path the fetched allow-list ends up at.
    pub fn allow_list_path(&self) -> PathBuf {
        self.destination.join(&self.file_name)
    }
}

/// Configuration for a sync run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SyncConfig {
    /// Directory holding one subdirectory per study.
    #[builder(default = "PathBuf::from(\"/data/xnat/archive\")")]
    #[serde(default = "default_archive_root")]
    pub archive_root: PathBuf,

    /// Allow-list of studies authorized for transfer.
    #[builder(default = "PathBuf::from(\"/data/xnat/scripts/xnat_Carle2Illinois.txt\")")]
    #[serde(default = "default_allow_list")]
    pub allow_list: PathBuf,

    /// Mount point the changed files are copied to.
    #[builder(default = "PathBuf::from(\"/netappcifs\")")]
    #[serde(default = "default_target_root")]
    pub target_root: PathBuf,

    /// Files modified within this many seconds are copied.
    #[builder(default = "DEFAULT_LOOKBACK_SECS")]
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,

    /// Owner uid applied to copied files.
    #[builder(default = "DEFAULT_OWNER_ID")]
    #[serde(default = "default_owner_id")]
    pub owner_uid: u32,

    /// Owner gid applied to copied files.
    #[builder(default = "DEFAULT_OWNER_ID")]
    #[serde(default = "default_owner_id")]
    pub owner_gid: u32,

    #[builder(default)]
    #[serde(default)]
    pub ownership_scope: OwnershipScope,

    /// Report what would be copied without touching the target.
    #[builder(default = "false")]
    #[serde(default)]
    pub dry_run: bool,

    /// Fetch the allow-list from git before running.
    #[builder(default)]
    #[serde(default)]
    pub fetch: Option<FetchConfig>,
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("/data/xnat/archive")
}

fn default_allow_list() -> PathBuf {
    PathBuf::from("/data/xnat/scripts/xnat_Carle2Illinois.txt")
}

fn default_target_root() -> PathBuf {
    PathBuf::from("/netappcifs")
}

fn default_lookback_secs() -> u64 {
    DEFAULT_LOOKBACK_SECS
}

fn default_owner_id() -> u32 {
    DEFAULT_OWNER_ID
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_file_name() -> String {
    "xnat_Carle2Illinois.txt".to_string()
}

fn default_fetch_destination() -> PathBuf {
    PathBuf::from("/data/xnat/scripts")
}

fn default_depth() -> i32 {
    1
}

impl SyncConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        for (name, path) in [
            ("Archive root", &self.archive_root),
            ("Allow-list path", &self.allow_list),
            ("Target root", &self.target_root),
        ] {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(format!("{name} cannot be empty"));
            }
        }
        if self.lookback_secs == Some(0) {
            return Err("Lookback window must be positive".to_string());
        }
        Ok(())
    }
}

impl SyncConfig {
    /// Create a new sync config builder.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Load a config from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, SyncError> {
        let text = std::fs::read_to_string(path).map_err(|source| SyncError::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, SyncError> {
        let config: Self = toml::from_str(text).map_err(|e| SyncError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system cannot.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.lookback_secs == 0 {
            return Err(SyncError::InvalidConfig {
                message: "Lookback window must be positive".to_string(),
            });
        }
        if self.archive_root.as_os_str().is_empty() || self.target_root.as_os_str().is_empty() {
            return Err(SyncError::InvalidConfig {
                message: "Archive and target roots are required".to_string(),
            });
        }
        Ok(())
    }

    /// The lookback window as a duration.
    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }

    /// The allow-list a run reads: the fetched file when fetching is configured.
    pub fn effective_allow_list(&self) -> PathBuf {
        match &self.fetch {
            Some(fetch) => fetch.allow_list_path(),
            None => self.allow_list.clone(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            archive_root: default_archive_root(),
            allow_list: default_allow_list(),
            target_root: default_target_root(),
            lookback_secs: DEFAULT_LOOKBACK_SECS,
            owner_uid: DEFAULT_OWNER_ID,
            owner_gid: DEFAULT_OWNER_ID,
            ownership_scope: OwnershipScope::default(),
            dry_run: false,
            fetch: None,
        }
    }
}

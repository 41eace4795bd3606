use std::path::{Path, PathBuf};
use studysync_core::{
    CopyRunResult, ErrorClass, FileCopyTask, OwnershipScope, RunOutcome, StudyId, StudyManifest,
    SyncConfig, SyncError,
};
use tempfile::TempDir;

#[test]
fn test_study_id_behaves_like_str() {
    let id = StudyId::new("StudyX");
    assert_eq!(id.as_str(), "StudyX");
    assert_eq!(id.to_string(), "StudyX");
    assert_eq!(StudyId::from("StudyX"), id);
    assert_ne!(StudyId::new("studyx"), id);
}

#[test]
fn test_manifest_lookup_by_name() {
    let mut manifest = StudyManifest::new();
    let task = FileCopyTask::derive(
        Path::new("/archive/StudyX/scan/1.dcm"),
        Path::new("/archive"),
        Path::new("/target"),
        10,
    )
    .unwrap();
    manifest.push(task.clone());

    assert!(!manifest.is_empty());
    assert_eq!(manifest.get("StudyX"), Some(&[task][..]));
    assert!(manifest.get("StudyY").is_none());
}

#[test]
fn test_config_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("studysync.toml");
    std::fs::write(
        &path,
        r#"
        archive_root = "/srv/xnat/archive"
        target_root = "/mnt/transfer"
        lookback_secs = 7200
        owner_uid = 500
        owner_gid = 501
        ownership_scope = "off"
        dry_run = true
        "#,
    )
    .unwrap();

    let config = SyncConfig::from_toml_file(&path).unwrap();
    assert_eq!(config.archive_root, PathBuf::from("/srv/xnat/archive"));
    assert_eq!(config.target_root, PathBuf::from("/mnt/transfer"));
    assert_eq!(config.lookback_secs, 7200);
    assert_eq!((config.owner_uid, config.owner_gid), (500, 501));
    assert_eq!(config.ownership_scope, OwnershipScope::Off);
    assert!(config.dry_run);
    assert!(config.fetch.is_none());
    assert_eq!(config.effective_allow_list(), config.allow_list);
}

#[test]
fn test_config_file_missing() {
    let temp = TempDir::new().unwrap();
    let err = SyncConfig::from_toml_file(&temp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SyncError::ConfigUnreadable { .. }));
    assert_eq!(err.class(), ErrorClass::Configuration);
}

#[test]
fn test_run_result_serializes() {
    let outcome = RunOutcome::Completed(CopyRunResult {
        files_considered: 3,
        total_bytes: 1024,
        studies_copied: vec![StudyId::new("StudyX")],
        ownership_changes: 2,
        ..Default::default()
    });

    let json = serde_json::to_string(&outcome).unwrap();
    assert!(json.contains("\"StudyX\""));
    assert!(json.contains("\"files_considered\":3"));
    assert!(json.contains("\"ownership_changes\":2"));
}

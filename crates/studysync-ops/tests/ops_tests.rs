use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use studysync_core::{OwnershipScope, StudyId, SyncConfig, WarningKind};
use studysync_ops::{CopyExecutor, NoWorkReason, OwnershipNormalizer, RunOutcome, SyncRun};
use studysync_scan::{ChangeScanner, ScanWindow};
use tempfile::TempDir;

fn current_owner() -> OwnershipNormalizer {
    OwnershipNormalizer::new(
        rustix::process::getuid().as_raw(),
        rustix::process::getgid().as_raw(),
    )
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn config(root: &Path, scope: OwnershipScope) -> SyncConfig {
    let owner = current_owner();
    SyncConfig::builder()
        .archive_root(root.join("archive"))
        .allow_list(root.join("studies.txt"))
        .target_root(root.join("target"))
        .owner_uid(owner.uid())
        .owner_gid(owner.gid())
        .ownership_scope(scope)
        .build()
        .unwrap()
}

#[test]
fn test_deleted_file_is_skipped_and_run_continues() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("archive");
    let target = temp.path().join("target");
    for name in ["img1.dcm", "img3.dcm", "img5.dcm"] {
        write(&archive.join("StudyX").join(name), name);
    }

    let window = ScanWindow::new(Duration::from_secs(3600));
    let report = ChangeScanner::new(&archive, &target, window)
        .scan(&[archive.join("StudyX")])
        .unwrap();
    assert_eq!(report.total_files, 3);

    fs::remove_file(archive.join("StudyX/img3.dcm")).unwrap();

    let copied = CopyExecutor::new(&target)
        .execute(&report.manifest, &[StudyId::new("StudyX")])
        .unwrap();

    assert_eq!(copied.files_copied.len(), 2);
    assert!(!copied.files_copied.contains(&target.join("StudyX/img3.dcm")));
    assert_eq!(copied.failures.len(), 1);
    assert_eq!(copied.failures[0].kind, WarningKind::Vanished);
    assert!(target.join("StudyX/img5.dcm").exists());
}

#[test]
fn test_existing_destination_is_overwritten() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join("archive/StudyX/img1.dcm"), "fresh pixels");
    write(&temp.path().join("target/StudyX/img1.dcm"), "stale content from last week");
    fs::write(temp.path().join("studies.txt"), "Smith/StudyX\n").unwrap();

    let outcome = SyncRun::new(config(temp.path(), OwnershipScope::Off))
        .execute()
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    let copied = fs::read(temp.path().join("target/StudyX/img1.dcm")).unwrap();
    assert_eq!(copied, b"fresh pixels");
}

#[test]
fn test_recopy_is_idempotent() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join("archive/StudyX/a/b/img.dcm"), "same bytes");
    fs::write(temp.path().join("studies.txt"), "Smith/StudyX\n").unwrap();
    let run = SyncRun::new(config(temp.path(), OwnershipScope::Tree));

    run.execute().unwrap();
    let first = fs::read(temp.path().join("target/StudyX/a/b/img.dcm")).unwrap();
    run.execute().unwrap();
    let second = fs::read(temp.path().join("target/StudyX/a/b/img.dcm")).unwrap();

    assert_eq!(first, second);
    assert_eq!(second, b"same bytes");
}

#[test]
fn test_normalize_twice_changes_nothing_second_time() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join("StudyX/series/img.dcm"), "x");
    let normalizer = current_owner();

    normalizer.normalize(temp.path(), true).unwrap();
    let second = normalizer.normalize(temp.path(), true).unwrap();
    assert_eq!(second, 0);
}

#[test]
fn test_unlisted_study_is_no_work() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join("archive/StudyX/img1.dcm"), "x");
    fs::write(temp.path().join("studies.txt"), "Jones/StudyY\n").unwrap();

    let outcome = SyncRun::new(config(temp.path(), OwnershipScope::Tree))
        .execute()
        .unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::NoWork(NoWorkReason::NoMatchingStudies)
    ));
    assert!(!temp.path().join("target").exists());
}

#[test]
fn test_full_run_summary() {
    let temp = TempDir::new().unwrap();
    let now = SystemTime::now();
    write(&temp.path().join("archive/StudyX/img1.dcm"), "recent");
    write(&temp.path().join("archive/StudyX/img2.dcm"), "old");
    filetime::set_file_mtime(
        temp.path().join("archive/StudyX/img2.dcm"),
        filetime::FileTime::from_system_time(now - Duration::from_secs(3 * 24 * 3600)),
    )
    .unwrap();
    write(&temp.path().join("archive/Other/img.dcm"), "not listed");
    fs::write(temp.path().join("studies.txt"), "Smith/StudyX\nLee/Quiet\n").unwrap();

    let outcome = SyncRun::new(config(temp.path(), OwnershipScope::Study))
        .with_reference_time(now + Duration::from_secs(1))
        .execute()
        .unwrap();

    let RunOutcome::Completed(result) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(result.files_considered, 1);
    assert_eq!(result.total_bytes, 6);
    assert_eq!(result.studies_resolved, vec![StudyId::new("StudyX")]);
    assert_eq!(result.studies_copied, vec![StudyId::new("StudyX")]);
    assert_eq!(
        result.files_copied,
        vec![temp.path().join("target/StudyX/img1.dcm")]
    );
    assert!(result.is_success());
    // Copies are already owned by the configured (current) owner
    assert_eq!(result.ownership_changes, 0);
    assert!(!temp.path().join("target/Other").exists());
}

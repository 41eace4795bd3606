//! Fetching the allow-list from its git repository.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use git2::FetchOptions;
use git2::build::RepoBuilder;
use tracing::{info, warn};

use studysync_core::{FetchConfig, SyncError};

use crate::ownership::OwnershipNormalizer;

/// Clone the allow-list repository into a scratch directory and move the
/// allow-list file into `config.destination`.
///
/// The scratch clone lives next to the destination and is removed once the
/// file has been moved out. Returns the path of the fetched file.
pub fn fetch_allow_list(
    config: &FetchConfig,
    normalizer: Option<&OwnershipNormalizer>,
) -> Result<PathBuf, SyncError> {
    fs::create_dir_all(&config.destination).map_err(|e| SyncError::io(&config.destination, e))?;

    let scratch = tempfile::Builder::new()
        .prefix(".allow-list-")
        .tempdir_in(&config.destination)
        .map_err(|e| SyncError::io(&config.destination, e))?;

    let mut fetch_options = FetchOptions::new();
    fetch_options.depth(config.depth);

    RepoBuilder::new()
        .branch(&config.branch)
        .fetch_options(fetch_options)
        .clone(&config.repository, scratch.path())
        .map_err(|e| SyncError::Fetch {
            url: config.repository.clone(),
            source: Box::new(e),
        })?;

    let fetched = scratch.path().join(&config.file_name);
    if !fetched.is_file() {
        return Err(SyncError::allow_list(
            fetched,
            std::io::Error::new(ErrorKind::NotFound, "file not present in repository"),
        ));
    }

    let destination = config.allow_list_path();
    fs::rename(&fetched, &destination).map_err(|e| SyncError::io(&destination, e))?;

    if let Some(normalizer) = normalizer {
        normalizer.normalize(&destination, false)?;
    }

    if let Err(err) = scratch.close() {
        warn!(error = %err, "Failed to remove scratch clone");
    }

    info!(
        repository = %config.repository,
        path = %destination.display(),
        "Fetched allow-list"
    );
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn init_repo(dir: &Path, files: &[(&str, &str)]) {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = git2::Repository::init_opts(dir, &opts).unwrap();

        let mut index = repo.index().unwrap();
        for (name, contents) in files {
            fs::write(dir.join(name), contents).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Test", "test@example.org").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "Add allow-list", &tree, &[])
            .unwrap();
    }

    fn fetch_config(repo: &Path, destination: &Path) -> FetchConfig {
        FetchConfig::builder()
            .repository(repo.to_string_lossy().to_string())
            .file_name("studies.txt")
            .destination(destination)
            .depth(0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_fetch_moves_file_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        let scripts = temp.path().join("scripts");
        fs::create_dir_all(&repo).unwrap();
        init_repo(&repo, &[("studies.txt", "Smith/StudyX\n"), ("README", "lists")]);

        let path = fetch_allow_list(&fetch_config(&repo, &scripts), None).unwrap();

        assert_eq!(path, scripts.join("studies.txt"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "Smith/StudyX\n");
        let leftovers: Vec<_> = fs::read_dir(&scripts).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_fetch_missing_file() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        fs::create_dir_all(&repo).unwrap();
        init_repo(&repo, &[("README", "no list here")]);

        let err = fetch_allow_list(&fetch_config(&repo, &temp.path().join("scripts")), None)
            .unwrap_err();
        assert!(matches!(err, SyncError::AllowListUnreadable { .. }));
    }

    #[test]
    fn test_fetch_bad_repository() {
        let temp = TempDir::new().unwrap();
        let err = fetch_allow_list(
            &fetch_config(&temp.path().join("not-a-repo"), &temp.path().join("scripts")),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Fetch { .. }));
    }
}

//! Ownership repair on the target tree.

use std::io::ErrorKind;
use std::path::Path;

use jwalk::{Parallelism, WalkDir};
use tracing::debug;

use studysync_core::SyncError;

/// Re-owns copied files so the downstream service account can read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipNormalizer {
    uid: u32,
    gid: u32,
}

impl OwnershipNormalizer {
    /// Create a normalizer applying `uid`/`gid`.
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    /// Set ownership on `root`, and on everything beneath it when `recursive`.
    ///
    /// Entries that already have the right owner are left alone, so applying
    /// this twice changes nothing the second time. Returns the number of
    /// entries changed. Symlinks are re-owned themselves, never their targets.
    pub fn normalize(&self, root: &Path, recursive: bool) -> Result<u64, SyncError> {
        if !recursive || !root.is_dir() {
            return Ok(u64::from(self.apply(root)?));
        }

        let walker = WalkDir::new(root)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(false)
            .min_depth(0);

        let mut changed = 0;
        for entry_result in walker {
            let mut entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    if is_vanished(&err) {
                        continue;
                    }
                    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    return Err(SyncError::io(path, walk_io_error(err)));
                }
            };

            let path = entry.path();
            if self.apply(&path)? {
                changed += 1;
            }

            // Children of a directory that cannot be listed would be left unowned
            if let Some(err) = entry.read_children_error.take() {
                if !is_vanished(&err) {
                    return Err(SyncError::io(path, walk_io_error(err)));
                }
            }
        }

        debug!(root = %root.display(), changed, "Normalized ownership");
        Ok(changed)
    }

    /// Re-own one entry. Returns whether anything changed.
    #[cfg(unix)]
    fn apply(&self, path: &Path) -> Result<bool, SyncError> {
        use std::os::unix::fs::MetadataExt;

        use rustix::fs::{AtFlags, CWD, chownat};

        let metadata = match std::fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(SyncError::io(path, err)),
        };
        if metadata.uid() == self.uid && metadata.gid() == self.gid {
            return Ok(false);
        }

        match chownat(
            CWD,
            path,
            Some(uid_from_raw(self.uid)),
            Some(gid_from_raw(self.gid)),
            AtFlags::SYMLINK_NOFOLLOW,
        ) {
            Ok(()) => Ok(true),
            Err(errno) => {
                let err = std::io::Error::from(errno);
                if err.kind() == ErrorKind::NotFound {
                    Ok(false)
                } else {
                    Err(SyncError::ownership(path, err))
                }
            }
        }
    }

    #[cfg(not(unix))]
    fn apply(&self, _path: &Path) -> Result<bool, SyncError> {
        Ok(false) // No numeric owners to set
    }
}

fn is_vanished(err: &jwalk::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == ErrorKind::NotFound)
}

fn walk_io_error(err: jwalk::Error) -> std::io::Error {
    err.into_io_error()
        .unwrap_or_else(|| std::io::Error::other("directory walk failed"))
}

#[cfg(unix)]
#[allow(unused_unsafe)]
fn uid_from_raw(raw: u32) -> rustix::fs::Uid {
    unsafe { rustix::fs::Uid::from_raw(raw) }
}

#[cfg(unix)]
#[allow(unused_unsafe)]
fn gid_from_raw(raw: u32) -> rustix::fs::Gid {
    unsafe { rustix::fs::Gid::from_raw(raw) }
}

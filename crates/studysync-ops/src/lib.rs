//! Copy, ownership and fetch operations for studysync.
//!
//! This crate turns a scan manifest into files on the target mount:
//!
//! - [`CopyExecutor`] copies the matched studies, keeping times and
//!   permissions, best-effort per file.
//! - [`OwnershipNormalizer`] re-owns the copied tree for the downstream
//!   service account.
//! - [`fetch_allow_list`] pulls the allow-list from its git repository.
//! - [`SyncRun`] drives a whole run and returns a [`RunOutcome`].
//!
//! ```rust,no_run
//! use studysync_core::{RunOutcome, SyncConfig};
//! use studysync_ops::SyncRun;
//!
//! match SyncRun::new(SyncConfig::default()).execute().unwrap() {
//!     RunOutcome::Completed(result) => println!("{}", result.summary()),
//!     RunOutcome::NoWork(reason) => println!("Nothing to do: {reason}"),
//! }
//! ```

mod copy;
mod fetch;
mod ownership;
mod pipeline;
mod progress;

pub use copy::CopyExecutor;
pub use fetch::fetch_allow_list;
pub use ownership::OwnershipNormalizer;
pub use pipeline::{Plan, SyncRun};
pub use progress::{CopyProgress, CopyReport};

// Re-export core types
pub use studysync_core::{CopyRunResult, NoWorkReason, RunOutcome, SyncConfig, SyncError};

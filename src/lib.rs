//! patchstage library crate.
//!
//! Stages a disposable branch in a git checkout so a candidate patch can be
//! tested without touching the checkout's real branches, and restores the
//! checkout afterwards.
//!
//! - [`controller`] — [`RepoController`]: resolve → isolate → probe, then
//!   `merge()` / `clean()` driven by the caller.
//! - [`resolve`] — target branch and commit resolution.
//! - [`isolate`] — the `<prefix>_<pid>` branch.
//! - [`probe`] — apply-then-restore mergeability check.
//! - [`patch`] — mbox patch descriptor and declared-branch parsing.
//! - [`git`] — the git command layer over `patchstage-exec`.
//! - [`cmdlog`] — command-log sinks.
//! - [`config`] — `.patchstage.toml`.
//!
//! ```no_run
//! use patchstage::{MemoryLog, Overrides, Patch, RepoController, StageConfig};
//! use patchstage_exec::ProcessRunner;
//!
//! # fn main() -> Result<(), patchstage::StageError> {
//! let log = MemoryLog::new();
//! let patch = Patch::from_file("0001-fix.patch")?;
//! let mut repo = RepoController::new(
//!     ".",
//!     patch,
//!     &Overrides::default(),
//!     &StageConfig::default(),
//!     &ProcessRunner,
//!     &log,
//! )?;
//! if repo.is_applicable() {
//!     repo.merge()?;
//!     // run tests against the merged tree
//! }
//! repo.clean()?;
//! # Ok(())
//! # }
//! ```

pub mod cmdlog;
pub mod config;
pub mod controller;
pub mod error;
pub mod git;
pub mod isolate;
pub mod patch;
pub mod probe;
pub mod resolve;

#[cfg(test)]
mod testing;

pub use cmdlog::{CommandLog, CommandRecord, MemoryLog, Tee, TracingLog};
pub use config::{ConfigError, StageConfig};
pub use controller::{Overrides, RepoController, StageSummary};
pub use error::StageError;
pub use patch::Patch;
pub use resolve::{CandidateSource, Resolution};

//! Staging error types.
//!
//! Defines [`StageError`], the error type for every controller operation.
//! Each variant names the phase that failed so the caller can tell "the
//! configuration did not resolve" apart from "git broke while we held the
//! working directory".
//!
//! A patch that does not apply is *not* an error: the probe records it as
//! `is_applicable() == false` and carries on.

use std::fmt;
use std::path::PathBuf;

use patchstage_exec::ExecError;

/// Error type for repository staging operations.
#[derive(Debug)]
pub enum StageError {
    /// No candidate (explicit commit, explicit branch, declared branch,
    /// `HEAD`) resolved to a commit.
    Resolution {
        /// Every candidate that was tried, in priority order.
        candidates: Vec<String>,
    },

    /// The isolated branch could not be created or checked out.
    Isolation {
        /// The isolated branch name.
        branch: String,
        source: ExecError,
    },

    /// A `git am` session was already in progress before the probe. Probing
    /// would abort it, so the run stops instead.
    AmInProgress,

    /// Restoring the isolated branch after the mergeability probe failed.
    /// The working directory may be left half-applied.
    ProbeRecovery {
        /// What the recovery step was trying to do.
        action: &'static str,
        source: ExecError,
    },

    /// `git am` failed during `merge()` even though the probe succeeded.
    Merge { source: ExecError },

    /// Returning to the original branch or deleting the isolated branch
    /// failed. The checkout may still be on the disposable branch.
    Clean {
        /// The isolated branch that was being removed.
        branch: String,
        source: ExecError,
    },

    /// The patch file could not be read.
    Patch {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Any other command failure, propagated unchanged.
    Exec(ExecError),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolution { candidates } => {
                write!(f, "no target commit could be resolved")?;
                if !candidates.is_empty() {
                    write!(f, " (tried: {})", candidates.join(", "))?;
                }
                Ok(())
            }
            Self::Isolation { branch, source } => {
                write!(f, "failed to create isolated branch '{branch}': {source}")
            }
            Self::AmInProgress => write!(
                f,
                "a git am session is already in progress; \
                 finish it or run `git am --abort` first"
            ),
            Self::ProbeRecovery { action, source } => {
                write!(
                    f,
                    "failed to {action} after the mergeability probe; \
                     the working directory may be inconsistent: {source}"
                )
            }
            Self::Merge { source } => write!(f, "failed to merge patch: {source}"),
            Self::Clean { branch, source } => {
                write!(
                    f,
                    "failed to clean up isolated branch '{branch}' \
                     (checkout may still be on it): {source}"
                )
            }
            Self::Patch { path, source } => {
                write!(f, "could not read patch {}: {source}", path.display())
            }
            Self::Exec(source) => write!(f, "{source}"),
        }
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resolution { .. } | Self::AmInProgress => None,
            Self::Isolation { source, .. }
            | Self::ProbeRecovery { source, .. }
            | Self::Merge { source }
            | Self::Clean { source, .. }
            | Self::Exec(source) => Some(source),
            Self::Patch { source, .. } => Some(source),
        }
    }
}

impl From<ExecError> for StageError {
    fn from(e: ExecError) -> Self {
        Self::Exec(e)
    }
}

//! Mergeability probe.
//!
//! Applies the patch on the isolated branch with `git am --keep-cr`, records
//! whether it applied, and always puts the branch back:
//!
//! - applied → `git reset --hard <commit>`
//! - rejected → `git am --abort` (when `git am` left a session behind)
//!
//! A session that already exists before the apply belongs to someone else;
//! the probe refuses to run rather than abort it.
//!
//! The restore step is owned by a [`ProbeGuard`]. The normal path calls
//! [`ProbeGuard::release`] and propagates its error as
//! [`StageError::ProbeRecovery`]. If the guard is dropped without being
//! released (an early `?` or a panic) it restores on a best-effort basis and
//! logs a warning when that fails.

use patchstage_exec::ExecError;

use crate::error::StageError;
use crate::git::Git;
use crate::patch::Patch;

/// Outcome of the apply attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Applied {
    Yes,
    No,
}

/// Holds "the patch may be (partly) applied" until the branch is restored.
#[must_use = "an unreleased ProbeGuard restores on drop and swallows errors"]
pub struct ProbeGuard<'g, 'a> {
    git: &'g Git<'a>,
    commit: &'g str,
    applied: Applied,
    released: bool,
}

impl<'g, 'a> ProbeGuard<'g, 'a> {
    const fn new(git: &'g Git<'a>, commit: &'g str, applied: Applied) -> Self {
        Self {
            git,
            commit,
            applied,
            released: false,
        }
    }

    /// Whether the patch applied.
    #[must_use]
    pub fn applicable(&self) -> bool {
        self.applied == Applied::Yes
    }

    /// Restore the isolated branch and report whether the patch applied.
    ///
    /// # Errors
    /// [`StageError::ProbeRecovery`] when the reset or abort fails.
    pub fn release(mut self) -> Result<bool, StageError> {
        self.released = true;
        self.restore()?;
        Ok(self.applicable())
    }

    fn restore(&self) -> Result<(), StageError> {
        match self.applied {
            Applied::Yes => self
                .git
                .reset_hard(self.commit)
                .map_err(|source| StageError::ProbeRecovery {
                    action: "reset the isolated branch",
                    source,
                }),
            Applied::No => {
                let in_progress =
                    self.git
                        .am_in_progress()
                        .map_err(|source| StageError::ProbeRecovery {
                            action: "inspect the git am session",
                            source,
                        })?;
                if !in_progress {
                    tracing::debug!("git am left no session behind; nothing to abort");
                    return Ok(());
                }
                self.git
                    .am_abort()
                    .map_err(|source| StageError::ProbeRecovery {
                        action: "abort git am",
                        source,
                    })
            }
        }
    }
}

impl Drop for ProbeGuard<'_, '_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "probe restore on unwind failed");
        }
    }
}

/// Try `git am` on the current branch, then restore it to `commit`.
///
/// Returns `Ok(true)` if the patch applied cleanly. A rejected patch is
/// `Ok(false)`, not an error.
///
/// # Errors
/// - [`StageError::AmInProgress`] if a `git am` session already exists;
///   nothing is applied and the session is left alone.
/// - [`StageError::Exec`] if git cannot run at all (the branch is still
///   restored best-effort).
/// - [`StageError::ProbeRecovery`] if restoring fails.
pub fn probe(git: &Git<'_>, patch: &Patch, commit: &str) -> Result<bool, StageError> {
    // The abort below must only ever hit a session this probe started.
    if git.am_in_progress()? {
        return Err(StageError::AmInProgress);
    }

    let attempt = git.am(patch.contents(), None);
    let guard = ProbeGuard::new(
        git,
        commit,
        if attempt.is_ok() { Applied::Yes } else { Applied::No },
    );

    match attempt {
        Ok(()) => tracing::debug!(patch = %patch, "patch applies"),
        Err(ref e @ ExecError::Failed { .. }) => {
            tracing::debug!(patch = %patch, error = %e, "patch does not apply");
        }
        Err(e @ ExecError::Spawn { .. }) => return Err(e.into()),
    }

    guard.release()
}

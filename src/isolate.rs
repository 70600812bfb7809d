//! Isolated branch creation.
//!
//! Every run works on a fresh branch `<prefix>_<pid>` created at the target
//! commit. The process id keeps concurrent runs against the same checkout
//! from choosing the same name; it is not a lock.
//!
//! Construction steps that run after the branch exists hold an
//! [`IsolationGuard`]. If one of them fails, dropping the guard returns to
//! the original branch and deletes the isolated one.

use crate::error::StageError;
use crate::git::Git;

/// `<prefix>_<pid>`.
#[must_use]
pub fn isolated_branch_name(prefix: &str, pid: u32) -> String {
    format!("{prefix}_{pid}")
}

/// Create `branch` at `commit` and check it out.
///
/// # Errors
/// [`StageError::Isolation`] if git refuses (branch exists, bad commit,
/// dirty tree that would be overwritten, ...). Not retried.
pub fn isolate(git: &Git<'_>, branch: &str, commit: &str) -> Result<(), StageError> {
    git.checkout_new_branch(branch, commit)
        .map_err(|source| StageError::Isolation {
            branch: branch.to_owned(),
            source,
        })?;
    tracing::debug!(branch, commit, "isolated branch checked out");
    Ok(())
}

/// Rolls back [`isolate`] unless disarmed.
#[must_use = "dropping an IsolationGuard immediately rolls the branch back"]
pub struct IsolationGuard<'g, 'a> {
    git: &'g Git<'a>,
    original: &'g str,
    branch: &'g str,
    armed: bool,
}

impl<'g, 'a> IsolationGuard<'g, 'a> {
    pub const fn new(git: &'g Git<'a>, original: &'g str, branch: &'g str) -> Self {
        Self {
            git,
            original,
            branch,
            armed: true,
        }
    }

    /// Keep the isolated branch.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for IsolationGuard<'_, '_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!(
            restore = self.original,
            branch = self.branch,
            "staging failed; rolling back isolated branch"
        );
        if let Err(e) = self.git.checkout(self.original) {
            tracing::warn!(error = %e, branch = self.original, "rollback checkout failed");
            return;
        }
        if let Err(e) = self.git.delete_branch_force(self.branch) {
            tracing::warn!(error = %e, branch = self.branch, "rollback branch delete failed");
        }
    }
}

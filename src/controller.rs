//! The repository controller.
//!
//! [`RepoController::new`] brings a checkout into a known state for one
//! patch test:
//!
//! 1. record the branch currently checked out (restored by [`clean`])
//! 2. resolve the target branch and commit
//! 3. create and check out `<prefix>_<pid>` at that commit
//! 4. probe whether the patch applies, leaving the branch untouched
//!
//! If step 4 fails, the original branch is checked out again and the
//! isolated branch deleted before the error is returned.
//!
//! The caller then optionally calls [`merge`] to apply the patch for real,
//! runs its tests, and must call [`clean`] on every path, errors included.
//!
//! [`merge`]: RepoController::merge
//! [`clean`]: RepoController::clean

use std::path::{Path, PathBuf};

use patchstage_exec::CommandRunner;
use serde::Serialize;

use crate::cmdlog::CommandLog;
use crate::config::StageConfig;
use crate::error::StageError;
use crate::git::Git;
use crate::isolate::{IsolationGuard, isolate, isolated_branch_name};
use crate::patch::Patch;
use crate::probe::probe;
use crate::resolve::{self, CandidateSource, ResolveInputs};

/// Caller overrides for resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Overrides {
    pub commit: Option<String>,
    pub branch: Option<String>,
}

/// Serializable snapshot of a controller's observable state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub repository: PathBuf,
    pub patch: PathBuf,
    pub declared_branch: Option<String>,
    pub branch: String,
    pub commit: String,
    pub commit_source: CandidateSource,
    pub original_branch: String,
    pub isolated_branch: String,
    pub applicable: bool,
    pub merged: bool,
}

/// Stages one patch on a disposable branch.
pub struct RepoController<'a> {
    git: Git<'a>,
    patch: Patch,
    resource_env: String,
    original_branch: String,
    branch: String,
    commit: String,
    commit_source: CandidateSource,
    isolated_branch: String,
    applicable: bool,
    merged: bool,
}

impl<'a> RepoController<'a> {
    /// Resolve, isolate, and probe.
    ///
    /// # Errors
    /// - [`StageError::Resolution`] when no commit candidate resolves.
    /// - [`StageError::Isolation`] when the isolated branch cannot be created.
    /// - [`StageError::AmInProgress`] when a `git am` session already exists.
    /// - [`StageError::ProbeRecovery`] when the probe cannot restore the branch.
    /// - [`StageError::Exec`] when git cannot run.
    ///
    /// Any failure after the isolated branch exists checks out the original
    /// branch again and deletes the isolated one before returning.
    ///
    /// A patch that does not apply is not an error; see [`is_applicable`].
    ///
    /// [`is_applicable`]: RepoController::is_applicable
    pub fn new(
        workdir: impl Into<PathBuf>,
        patch: Patch,
        overrides: &Overrides,
        config: &StageConfig,
        runner: &'a dyn CommandRunner,
        log: &'a dyn CommandLog,
    ) -> Result<Self, StageError> {
        let git = Git::new(workdir, config.git.program.as_str(), runner, log);

        let original_branch = resolve::current_branch(&git, &config.repo.detached_fallback)?;

        let inputs = ResolveInputs {
            explicit_commit: overrides.commit.as_deref(),
            explicit_branch: overrides.branch.as_deref(),
            declared_branch: patch.declared_branch(),
        };
        let resolution = resolve::resolve(&git, &inputs, &original_branch)?;

        let isolated_branch = isolated_branch_name(&config.isolation.prefix, std::process::id());
        isolate(&git, &isolated_branch, &resolution.commit)?;

        let rollback = IsolationGuard::new(&git, &original_branch, &isolated_branch);
        let applicable = probe(&git, &patch, &resolution.commit)?;
        rollback.disarm();

        let controller = Self {
            git,
            patch,
            resource_env: config.apply.resource_env.clone(),
            original_branch,
            branch: resolution.branch,
            commit: resolution.commit,
            commit_source: resolution.commit_source,
            isolated_branch,
            applicable,
            merged: false,
        };

        tracing::debug!(
            repository = %controller.workdir().display(),
            target_commit = %controller.commit,
            target_branch = %controller.branch,
            working_branch = %controller.isolated_branch,
            patch = %controller.patch,
            applicable = controller.applicable,
            "repository staged"
        );
        Ok(controller)
    }

    /// Apply the patch on the isolated branch. No-op when the probe said it
    /// does not apply.
    ///
    /// The configured resource variable (default `PTRESOURCE`) is set to the
    /// patch path for the `git am` process.
    ///
    /// # Errors
    /// [`StageError::Merge`] if `git am` fails despite a successful probe.
    pub fn merge(&mut self) -> Result<(), StageError> {
        if !self.applicable {
            tracing::debug!(patch = %self.patch, "patch does not apply; merge skipped");
            return Ok(());
        }
        self.git
            .am(
                self.patch.contents(),
                Some((self.resource_env.as_str(), self.patch.path())),
            )
            .map_err(|source| StageError::Merge { source })?;
        self.merged = true;
        tracing::info!(patch = %self.patch, branch = %self.isolated_branch, "patch merged");
        Ok(())
    }

    /// Check out the original branch and delete the isolated branch.
    ///
    /// # Errors
    /// [`StageError::Clean`] if either step fails. The checkout may still be
    /// on the isolated branch in that case.
    pub fn clean(&mut self) -> Result<(), StageError> {
        let wrap = |source| StageError::Clean {
            branch: self.isolated_branch.clone(),
            source,
        };
        self.git.checkout(&self.original_branch).map_err(wrap)?;
        self.git
            .delete_branch_force(&self.isolated_branch)
            .map_err(wrap)?;
        self.merged = false;
        tracing::debug!(
            restored = %self.original_branch,
            deleted = %self.isolated_branch,
            "isolated branch cleaned"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Observable state
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn workdir(&self) -> &Path {
        self.git.workdir()
    }

    #[must_use]
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    #[must_use]
    pub fn patch_path(&self) -> &Path {
        self.patch.path()
    }

    /// Resolved target branch (reporting only).
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Resolved target commit, abbreviated.
    #[must_use]
    pub fn commit(&self) -> &str {
        &self.commit
    }

    #[must_use]
    pub const fn commit_source(&self) -> CandidateSource {
        self.commit_source
    }

    #[must_use]
    pub fn original_branch(&self) -> &str {
        &self.original_branch
    }

    #[must_use]
    pub fn isolated_branch(&self) -> &str {
        &self.isolated_branch
    }

    #[must_use]
    pub const fn is_applicable(&self) -> bool {
        self.applicable
    }

    #[must_use]
    pub const fn is_merged(&self) -> bool {
        self.merged
    }

    #[must_use]
    pub fn summary(&self) -> StageSummary {
        StageSummary {
            repository: self.workdir().to_owned(),
            patch: self.patch.path().to_owned(),
            declared_branch: self.patch.declared_branch().map(str::to_owned),
            branch: self.branch.clone(),
            commit: self.commit.clone(),
            commit_source: self.commit_source,
            original_branch: self.original_branch.clone(),
            isolated_branch: self.isolated_branch.clone(),
            applicable: self.applicable,
            merged: self.merged,
        }
    }
}

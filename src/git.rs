//! Git command layer for the staging controller.
//!
//! [`Git`] binds a working directory, a [`CommandRunner`], and a
//! [`CommandLog`]. Each method builds the `git` invocations for one
//! operation, runs them as a batch, and reports the batch to the log.
//!
//! Methods return [`ExecError`] unchanged; deciding whether a failure is an
//! answer ("that ref does not exist") or a fault is the caller's job.

use std::path::{Path, PathBuf};

use patchstage_exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};

use crate::cmdlog::CommandLog;

/// `git rev-parse --abbrev-ref HEAD` prints this when `HEAD` is detached.
pub const DETACHED_HEAD: &str = "HEAD";

/// Git operations against one working directory.
pub struct Git<'a> {
    workdir: PathBuf,
    program: String,
    runner: &'a dyn CommandRunner,
    log: &'a dyn CommandLog,
}

impl<'a> Git<'a> {
    pub fn new(
        workdir: impl Into<PathBuf>,
        program: impl Into<String>,
        runner: &'a dyn CommandRunner,
        log: &'a dyn CommandLog,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            program: program.into(),
            runner,
            log,
        }
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run a batch of git commands and report it to the log.
    ///
    /// # Errors
    /// The first failing command's error.
    pub fn exec(&self, specs: Vec<CommandSpec>) -> Result<Vec<CommandOutput>, ExecError> {
        let specs: Vec<CommandSpec> = specs
            .into_iter()
            .map(|s| s.with_program(self.program.as_str()))
            .collect();
        match self.runner.run_batch(&self.workdir, &specs) {
            Ok(outputs) => {
                self.log.batch_succeeded(&outputs);
                Ok(outputs)
            }
            Err(e) => {
                self.log.batch_failed(&specs, &e);
                Err(e)
            }
        }
    }

    /// Run one git command and return its trimmed stdout.
    fn stdout_of<I, S>(&self, args: I) -> Result<String, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString>,
    {
        let mut outputs = self.exec(vec![CommandSpec::git(args)])?;
        Ok(outputs.pop().map(|o| o.stdout).unwrap_or_default())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Short name of the checked-out branch, or [`DETACHED_HEAD`].
    ///
    /// # Errors
    /// Propagates the command failure (e.g. not a repository, unborn HEAD).
    pub fn current_branch(&self) -> Result<String, ExecError> {
        self.stdout_of(["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Abbreviated commit id `rev` points at.
    ///
    /// # Errors
    /// [`ExecError::Failed`] when `rev` does not name a commit.
    pub fn rev_parse_short(&self, rev: &str) -> Result<String, ExecError> {
        self.stdout_of([
            "rev-parse".to_owned(),
            "--short".to_owned(),
            "--verify".to_owned(),
            "--quiet".to_owned(),
            format!("{rev}^{{commit}}"),
        ])
    }

    /// Configured remote names, in `git remote` order.
    ///
    /// # Errors
    /// Propagates the command failure.
    pub fn remotes(&self) -> Result<Vec<String>, ExecError> {
        Ok(split_lines(&self.stdout_of(["remote"])?))
    }

    /// Remote-tracking branches as `git branch --remotes` lists them
    /// (`origin/main`, `origin/HEAD -> origin/main`, ...).
    ///
    /// # Errors
    /// Propagates the command failure.
    pub fn remote_branches(&self) -> Result<Vec<String>, ExecError> {
        Ok(split_lines(&self.stdout_of(["branch", "--remotes"])?))
    }

    /// Whether a `git am` session is in progress.
    ///
    /// # Errors
    /// Propagates the command failure.
    pub fn am_in_progress(&self) -> Result<bool, ExecError> {
        let dir = self.stdout_of(["rev-parse", "--git-path", "rebase-apply"])?;
        Ok(self.workdir.join(dir).is_dir())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// `git checkout -b <branch> <start>`.
    ///
    /// # Errors
    /// Propagates the command failure.
    pub fn checkout_new_branch(&self, branch: &str, start: &str) -> Result<(), ExecError> {
        self.exec(vec![CommandSpec::git(["checkout", "-b", branch, start])])
            .map(drop)
    }

    /// `git checkout <branch>`.
    ///
    /// # Errors
    /// Propagates the command failure.
    pub fn checkout(&self, branch: &str) -> Result<(), ExecError> {
        self.exec(vec![CommandSpec::git(["checkout", branch])])
            .map(drop)
    }

    /// `git branch -D <branch>`.
    ///
    /// # Errors
    /// Propagates the command failure.
    pub fn delete_branch_force(&self, branch: &str) -> Result<(), ExecError> {
        self.exec(vec![CommandSpec::git(["branch", "-D", branch])])
            .map(drop)
    }

    /// Apply an mbox with `git am --keep-cr`, piping `mbox` on stdin.
    /// `env` is exported to the `git am` process.
    ///
    /// # Errors
    /// [`ExecError::Failed`] when the patch does not apply.
    pub fn am(&self, mbox: &[u8], env: Option<(&str, &Path)>) -> Result<(), ExecError> {
        let mut spec = CommandSpec::git(["am", "--keep-cr"]).stdin(mbox.to_vec());
        if let Some((key, value)) = env {
            spec = spec.env(key, value.as_os_str());
        }
        self.exec(vec![spec]).map(drop)
    }

    /// `git am --abort`.
    ///
    /// # Errors
    /// Propagates the command failure.
    pub fn am_abort(&self) -> Result<(), ExecError> {
        self.exec(vec![CommandSpec::git(["am", "--abort"])]).map(drop)
    }

    /// `git reset --hard <rev>`.
    ///
    /// # Errors
    /// Propagates the command failure.
    pub fn reset_hard(&self, rev: &str) -> Result<(), ExecError> {
        self.exec(vec![CommandSpec::git(["reset", "--hard", rev])])
            .map(drop)
    }
}

fn split_lines(s: &str) -> Vec<String> {
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

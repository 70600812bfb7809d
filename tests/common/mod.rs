//! Shared test helpers for patchstage integration tests.
//!
//! All tests use temp directories, never the real repo.
//! Each test gets its own git repo via [`setup_repo`] or [`setup_with_remote`].

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Run a git command in `dir`. Panics on failure. Returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {}: {e}", args.join(" ")));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "git {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.trim().to_string()
}

/// Whether a git command succeeds in `dir`.
pub fn git_succeeds(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Create a fresh git repo on branch `main` with one commit touching
/// `README.md`.
pub fn setup_repo() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    let p = dir.path();

    git(p, &["init", "--quiet"]);
    git(p, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(p, &["config", "user.email", "test@example.com"]);
    git(p, &["config", "user.name", "Test User"]);
    git(p, &["config", "commit.gpgsign", "false"]);

    std::fs::write(p.join("README.md"), "hello\n").unwrap();
    git(p, &["add", "README.md"]);
    git(p, &["commit", "--quiet", "-m", "initial commit"]);

    dir
}

/// A repo with a bare `origin` remote carrying `main` and `feature`.
/// `feature` exists only as `origin/feature` locally.
pub struct Fixture {
    pub repo: TempDir,
    pub remote: TempDir,
    pub patches: TempDir,
}

impl Fixture {
    pub fn path(&self) -> &Path {
        self.repo.path()
    }

    /// Write `contents` to a patch file outside the repo and return its path.
    pub fn write_patch(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.patches.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Short commit id of `rev`.
    pub fn short(&self, rev: &str) -> String {
        git(self.path(), &["rev-parse", "--short", rev])
    }

    /// Checked-out branch name.
    pub fn current_branch(&self) -> String {
        git(self.path(), &["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        git_succeeds(
            self.path(),
            &["rev-parse", "--verify", "--quiet", &format!("refs/heads/{name}")],
        )
    }

    pub fn tree(&self, rev: &str) -> String {
        git(self.path(), &["rev-parse", &format!("{rev}^{{tree}}")])
    }

    pub fn status(&self) -> String {
        git(self.path(), &["status", "--porcelain"])
    }

    pub fn am_in_progress(&self) -> bool {
        self.path().join(".git").join("rebase-apply").exists()
    }
}

pub fn setup_with_remote() -> Fixture {
    let remote = TempDir::new().expect("failed to create remote temp dir");
    git(remote.path(), &["init", "--bare", "--quiet"]);

    let repo = setup_repo();
    let p = repo.path();
    git(p, &["remote", "add", "origin", &remote.path().display().to_string()]);
    git(p, &["push", "--quiet", "origin", "main"]);

    git(p, &["checkout", "--quiet", "-b", "feature"]);
    std::fs::write(p.join("feature.txt"), "feature work\n").unwrap();
    git(p, &["add", "feature.txt"]);
    git(p, &["commit", "--quiet", "-m", "feature work"]);
    git(p, &["push", "--quiet", "origin", "feature"]);
    git(p, &["checkout", "--quiet", "main"]);
    git(p, &["branch", "--quiet", "-D", "feature"]);

    Fixture {
        repo,
        remote,
        patches: TempDir::new().expect("failed to create patch temp dir"),
    }
}

/// Build an mbox patch that edits `file` to `contents`, on top of `base`,
/// with the given subject prefix. The repo is left on the branch it was on,
/// or at the same commit when `HEAD` is detached.
pub fn make_patch(repo: &Path, base: &str, file: &str, contents: &str, prefix: &str) -> Vec<u8> {
    let start = match git(repo, &["rev-parse", "--abbrev-ref", "HEAD"]) {
        head if head == "HEAD" => git(repo, &["rev-parse", "HEAD"]),
        branch => branch,
    };
    git(repo, &["checkout", "--quiet", "-b", "patch-src", base]);
    std::fs::write(repo.join(file), contents).unwrap();
    git(repo, &["add", file]);
    git(repo, &["commit", "--quiet", "-m", &format!("{file}: update")]);
    let mbox = Command::new("git")
        .args([
            "format-patch",
            "-1",
            "--stdout",
            &format!("--subject-prefix={prefix}"),
        ])
        .current_dir(repo)
        .output()
        .expect("git format-patch failed");
    assert!(mbox.status.success());
    git(repo, &["checkout", "--quiet", &start]);
    git(repo, &["branch", "--quiet", "-D", "patch-src"]);
    mbox.stdout
}

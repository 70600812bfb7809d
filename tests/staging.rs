//! End-to-end staging tests against real git repositories.
//!
//! Each test builds a repo with an `origin` remote (see `common`), stages a
//! patch with [`RepoController`], and checks the checkout afterwards.

mod common;

use common::{Fixture, git, make_patch, setup_with_remote};
use patchstage::{
    CandidateSource, MemoryLog, Overrides, Patch, RepoController, StageConfig, StageError,
};
use patchstage_exec::ProcessRunner;

fn stage<'a>(
    fx: &Fixture,
    patch: Patch,
    overrides: &Overrides,
    config: &StageConfig,
    log: &'a MemoryLog,
) -> RepoController<'a> {
    RepoController::new(fx.path(), patch, overrides, config, &ProcessRunner, log)
        .expect("staging failed")
}

fn readme_patch(fx: &Fixture, prefix: &str) -> Patch {
    let mbox = make_patch(fx.path(), "main", "README.md", "hello\npatched\n", prefix);
    Patch::from_file(fx.write_patch("0001-readme.patch", &mbox)).unwrap()
}

// ===========================================================================
// Resolution
// ===========================================================================

#[test]
fn declared_upstream_branch_is_the_target() {
    let fx = setup_with_remote();
    let mbox = make_patch(
        fx.path(),
        "origin/feature",
        "feature.txt",
        "feature work\nmore\n",
        "PATCH, feature",
    );
    let patch = Patch::from_file(fx.write_patch("0001-feature.patch", &mbox)).unwrap();
    assert_eq!(patch.declared_branch(), Some("feature"));

    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &Overrides::default(), &StageConfig::default(), &log);

    assert_eq!(repo.branch(), "feature");
    assert_eq!(repo.commit(), fx.short("origin/feature"));
    assert_eq!(repo.commit_source(), CandidateSource::DeclaredBranch);
    assert!(repo.is_applicable());
    repo.clean().unwrap();
}

#[test]
fn unknown_declared_branch_falls_back_to_current() {
    let fx = setup_with_remote();
    let patch = readme_patch(&fx, "PATCH, nonexistent");
    assert_eq!(patch.declared_branch(), Some("nonexistent"));

    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &Overrides::default(), &StageConfig::default(), &log);

    assert_eq!(repo.branch(), "main");
    assert_eq!(repo.commit(), fx.short("main"));
    assert_eq!(repo.commit_source(), CandidateSource::Head);
    repo.clean().unwrap();
}

#[test]
fn explicit_commit_has_highest_priority() {
    let fx = setup_with_remote();
    let p = fx.path();
    std::fs::write(p.join("other.txt"), "x\n").unwrap();
    git(p, &["add", "other.txt"]);
    git(p, &["commit", "--quiet", "-m", "second"]);
    let first = fx.short("main~1");

    let patch = readme_patch(&fx, "PATCH, feature");
    let overrides = Overrides {
        commit: Some(first.clone()),
        branch: Some("main".to_owned()),
    };
    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &overrides, &StageConfig::default(), &log);

    assert_eq!(repo.commit(), first);
    assert_eq!(repo.branch(), "main");
    assert_eq!(repo.commit_source(), CandidateSource::ExplicitCommit);
    repo.clean().unwrap();
}

#[test]
fn explicit_branch_beats_declared_branch() {
    let fx = setup_with_remote();
    let patch = readme_patch(&fx, "PATCH, feature");
    let overrides = Overrides {
        commit: None,
        branch: Some("main".to_owned()),
    };
    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &overrides, &StageConfig::default(), &log);

    assert_eq!(repo.branch(), "main");
    assert_eq!(repo.commit(), fx.short("main"));
    assert_eq!(repo.commit_source(), CandidateSource::ExplicitBranch);
    repo.clean().unwrap();
}

#[test]
fn explicit_branch_resolves_through_remote() {
    let fx = setup_with_remote();
    let patch = readme_patch(&fx, "PATCH");
    let overrides = Overrides {
        commit: None,
        branch: Some("feature".to_owned()),
    };
    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &overrides, &StageConfig::default(), &log);

    assert_eq!(repo.commit(), fx.short("origin/feature"));
    assert!(
        log.commands()
            .iter()
            .any(|c| c.ends_with("origin/feature^{commit}")),
        "expected a remote-qualified lookup, got {:?}",
        log.commands()
    );
    repo.clean().unwrap();
}

#[test]
fn resolution_is_repeatable() {
    let fx = setup_with_remote();
    let log = MemoryLog::new();
    let mut seen = Vec::new();
    for _ in 0..2 {
        let patch = readme_patch(&fx, "PATCH, feature");
        let mut repo = stage(&fx, patch, &Overrides::default(), &StageConfig::default(), &log);
        seen.push((repo.branch().to_owned(), repo.commit().to_owned()));
        repo.clean().unwrap();
    }
    assert_eq!(seen[0], seen[1]);
}

#[test]
fn detached_head_restores_configured_fallback() {
    let fx = setup_with_remote();
    git(fx.path(), &["checkout", "--quiet", "--detach", "main"]);

    let config = StageConfig::parse("[repo]\ndetached_fallback = \"main\"\n").unwrap();
    let patch = readme_patch(&fx, "PATCH");
    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &Overrides::default(), &config, &log);

    assert_eq!(repo.original_branch(), "main");
    assert_eq!(repo.commit(), fx.short("main"));
    repo.clean().unwrap();
    assert_eq!(fx.current_branch(), "main");
}

#[test]
fn patch_fixture_keeps_detached_head() {
    let fx = setup_with_remote();
    git(fx.path(), &["checkout", "--quiet", "--detach", "main"]);
    let _ = readme_patch(&fx, "PATCH");
    assert_eq!(fx.current_branch(), "HEAD");
    assert_eq!(fx.short("HEAD"), fx.short("main"));
    assert!(!fx.branch_exists("patch-src"));
}

// ===========================================================================
// Probe, merge, clean
// ===========================================================================

#[test]
fn probe_leaves_no_residue_and_merge_applies() {
    let fx = setup_with_remote();
    let patch = readme_patch(&fx, "PATCH");
    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &Overrides::default(), &StageConfig::default(), &log);

    assert!(repo.is_applicable());
    assert!(!repo.is_merged());
    assert_eq!(fx.current_branch(), repo.isolated_branch());
    assert_eq!(fx.tree("HEAD"), fx.tree(repo.commit()));
    assert_eq!(fx.short("HEAD"), repo.commit());
    assert_eq!(fx.status(), "");

    repo.merge().unwrap();
    assert!(repo.is_merged());
    assert_ne!(fx.tree("HEAD"), fx.tree(repo.commit()));
    assert_eq!(
        std::fs::read_to_string(fx.path().join("README.md")).unwrap(),
        "hello\npatched\n"
    );

    let isolated = repo.isolated_branch().to_owned();
    repo.clean().unwrap();
    assert!(!repo.is_merged());
    assert_eq!(fx.current_branch(), "main");
    assert!(!fx.branch_exists(&isolated));
    assert_eq!(
        std::fs::read_to_string(fx.path().join("README.md")).unwrap(),
        "hello\n"
    );
}

#[test]
fn conflicting_patch_is_not_applicable_and_leaves_tree_untouched() {
    let fx = setup_with_remote();
    let patch = readme_patch(&fx, "PATCH");

    // Diverge main on the same line the patch touches.
    let p = fx.path();
    std::fs::write(p.join("README.md"), "hello from main\n").unwrap();
    git(p, &["commit", "--quiet", "-am", "diverge"]);

    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &Overrides::default(), &StageConfig::default(), &log);

    assert!(!repo.is_applicable());
    assert!(!fx.am_in_progress(), "git am session must be aborted");
    assert_eq!(fx.tree("HEAD"), fx.tree(repo.commit()));
    assert_eq!(fx.status(), "");

    let head = fx.short("HEAD");
    repo.merge().unwrap();
    assert!(!repo.is_merged());
    assert_eq!(fx.short("HEAD"), head);

    let isolated = repo.isolated_branch().to_owned();
    repo.clean().unwrap();
    assert_eq!(fx.current_branch(), "main");
    assert!(!fx.branch_exists(&isolated));
}

#[test]
fn malformed_patch_is_not_applicable() {
    let fx = setup_with_remote();
    let path = fx.write_patch("garbage.patch", b"this is not a patch at all\n");
    let patch = Patch::from_file(path).unwrap();
    assert_eq!(patch.declared_branch(), None);

    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &Overrides::default(), &StageConfig::default(), &log);

    assert!(!repo.is_applicable());
    assert!(!fx.am_in_progress());
    assert_eq!(fx.tree("HEAD"), fx.tree(repo.commit()));
    repo.merge().unwrap();
    assert!(!repo.is_merged());
    repo.clean().unwrap();
    assert_eq!(fx.current_branch(), "main");
}

#[test]
fn failed_staging_rolls_back_and_keeps_existing_am_session() {
    let fx = setup_with_remote();
    let patch = readme_patch(&fx, "PATCH");
    let session = fx.path().join(".git/rebase-apply");
    std::fs::create_dir_all(&session).unwrap();

    let log = MemoryLog::new();
    let err = RepoController::new(
        fx.path(),
        patch,
        &Overrides::default(),
        &StageConfig::default(),
        &ProcessRunner,
        &log,
    )
    .err()
    .expect("staging over an existing git am session must fail");

    assert!(matches!(err, StageError::AmInProgress), "got {err}");
    assert_eq!(fx.current_branch(), "main");
    assert!(!fx.branch_exists(&format!("patchtest_{}", std::process::id())));
    assert!(session.is_dir(), "the existing session must not be aborted");
    assert!(!log.commands().iter().any(|c| c == "git am --keep-cr"));
}

#[test]
fn clean_without_merge_restores_original_branch() {
    let fx = setup_with_remote();
    let patch = readme_patch(&fx, "PATCH");
    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &Overrides::default(), &StageConfig::default(), &log);
    let isolated = repo.isolated_branch().to_owned();
    assert!(fx.branch_exists(&isolated));

    repo.clean().unwrap();
    assert_eq!(fx.current_branch(), "main");
    assert!(!fx.branch_exists(&isolated));
}

#[test]
fn isolated_branch_uses_configured_prefix_and_pid() {
    let fx = setup_with_remote();
    let config = StageConfig::parse("[isolation]\nprefix = \"ci-stage\"\n").unwrap();
    let patch = readme_patch(&fx, "PATCH");
    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &Overrides::default(), &config, &log);
    assert_eq!(
        repo.isolated_branch(),
        format!("ci-stage_{}", std::process::id())
    );
    repo.clean().unwrap();
}

#[test]
fn every_command_is_logged() {
    let fx = setup_with_remote();
    let patch = readme_patch(&fx, "PATCH");
    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &Overrides::default(), &StageConfig::default(), &log);
    repo.merge().unwrap();
    repo.clean().unwrap();

    let commands = log.commands();
    assert_eq!(commands.first().map(String::as_str), Some("git rev-parse --abbrev-ref HEAD"));
    assert_eq!(commands.iter().filter(|c| *c == "git am --keep-cr").count(), 2);
    assert!(commands.iter().any(|c| c.starts_with("git reset --hard ")));
    assert!(commands.last().is_some_and(|c| c.starts_with("git branch -D ")));
    assert!(log.records().iter().all(|r| r.ok));
}

#[cfg(unix)]
#[test]
fn merge_exports_patch_path_to_hooks() {
    use std::os::unix::fs::PermissionsExt as _;

    let fx = setup_with_remote();
    let seen = fx.patches.path().join("seen.txt");
    let hook = fx.path().join(".git/hooks/post-applypatch");
    std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
    std::fs::write(
        &hook,
        format!(
            "#!/bin/sh\necho \"${{PTRESOURCE:-unset}}\" >> '{}'\n",
            seen.display()
        ),
    )
    .unwrap();
    std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

    let patch = readme_patch(&fx, "PATCH");
    let patch_path = patch.path().to_owned();
    let log = MemoryLog::new();
    let mut repo = stage(&fx, patch, &Overrides::default(), &StageConfig::default(), &log);
    repo.merge().unwrap();
    repo.clean().unwrap();

    let lines: Vec<String> = std::fs::read_to_string(&seen)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect();
    assert_eq!(lines.first().map(String::as_str), Some("unset"), "probe runs without it");
    assert_eq!(lines.last(), Some(&patch_path.display().to_string()));
}

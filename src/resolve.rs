//! Target branch and commit resolution.
//!
//! # Branch
//!
//! 1. explicit branch (caller override)
//! 2. branch declared by the patch, **only if** it exists on a remote
//! 3. the branch checked out right now
//!
//! # Commit
//!
//! The first of these that resolves to a commit wins:
//!
//! 1. explicit commit
//! 2. explicit branch
//! 3. validated declared branch
//! 4. `HEAD`
//!
//! A name is tried as a local revision first, then as `<remote>/<name>` for
//! each remote in `git remote` order. A candidate that does not resolve is
//! skipped; running out of candidates is a [`StageError::Resolution`].

use std::collections::BTreeSet;
use std::fmt;

use patchstage_exec::ExecError;
use serde::Serialize;

use crate::error::StageError;
use crate::git::{DETACHED_HEAD, Git};

/// Caller- and patch-supplied resolution inputs. Empty strings count as
/// absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveInputs<'a> {
    pub explicit_commit: Option<&'a str>,
    pub explicit_branch: Option<&'a str>,
    pub declared_branch: Option<&'a str>,
}

/// Resolved target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Branch reported as the test target.
    pub branch: String,
    /// Abbreviated commit the isolated branch starts from.
    pub commit: String,
    /// Which candidate produced `commit`.
    pub commit_source: CandidateSource,
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// Where a commit candidate came from, in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateSource {
    ExplicitCommit,
    ExplicitBranch,
    DeclaredBranch,
    Head,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExplicitCommit => write!(f, "explicit commit"),
            Self::ExplicitBranch => write!(f, "explicit branch"),
            Self::DeclaredBranch => write!(f, "patch branch"),
            Self::Head => write!(f, "HEAD"),
        }
    }
}

/// A revision name to try.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub source: CandidateSource,
    pub name: String,
}

/// Build the commit candidates in priority order. `valid_declared` must
/// already have been checked against the upstream branches.
#[must_use]
pub fn commit_candidates(inputs: &ResolveInputs<'_>, valid_declared: Option<&str>) -> Vec<Candidate> {
    [
        (CandidateSource::ExplicitCommit, non_empty(inputs.explicit_commit)),
        (CandidateSource::ExplicitBranch, non_empty(inputs.explicit_branch)),
        (CandidateSource::DeclaredBranch, non_empty(valid_declared)),
        (CandidateSource::Head, Some("HEAD")),
    ]
    .into_iter()
    .filter_map(|(source, name)| {
        name.map(|n| Candidate {
            source,
            name: n.to_owned(),
        })
    })
    .collect()
}

/// Pick the target branch.
#[must_use]
pub fn resolve_branch(
    explicit: Option<&str>,
    valid_declared: Option<&str>,
    current: &str,
) -> String {
    non_empty(explicit)
        .or_else(|| non_empty(valid_declared))
        .unwrap_or(current)
        .to_owned()
}

/// Keep the declared branch only if it names an upstream branch.
#[must_use]
pub fn validate_declared<'d>(
    declared: Option<&'d str>,
    upstream: &BTreeSet<String>,
) -> Option<&'d str> {
    non_empty(declared).filter(|b| upstream.contains(*b))
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Repository queries
// ---------------------------------------------------------------------------

/// The checked-out branch, or `fallback` when `HEAD` is detached.
///
/// # Errors
/// Propagates git failures.
pub fn current_branch(git: &Git<'_>, fallback: &str) -> Result<String, ExecError> {
    let branch = git.current_branch()?;
    if branch == DETACHED_HEAD {
        tracing::warn!(
            fallback,
            "HEAD is detached; '{fallback}' will be checked out after the run"
        );
        return Ok(fallback.to_owned());
    }
    Ok(branch)
}

/// Branch names present on any remote, with the remote prefix removed.
///
/// # Errors
/// Propagates git failures.
pub fn upstream_branches(git: &Git<'_>) -> Result<BTreeSet<String>, ExecError> {
    let remotes = git.remotes()?;
    let listed = git.remote_branches()?;
    Ok(strip_remote_prefixes(&listed, &remotes))
}

/// `origin/feature/x` → `feature/x`; symbolic `origin/HEAD -> ...` entries
/// are dropped.
#[must_use]
pub fn strip_remote_prefixes(listed: &[String], remotes: &[String]) -> BTreeSet<String> {
    listed
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.contains(" -> "))
        .filter_map(|l| {
            remotes
                .iter()
                .find_map(|r| l.strip_prefix(r.as_str())?.strip_prefix('/'))
                .or_else(|| l.split_once('/').map(|(_, name)| name))
        })
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Resolve `name` to an abbreviated commit id: locally first, then under
/// each remote. `Ok(None)` means "does not resolve".
///
/// # Errors
/// Only when git itself cannot run or `git remote` fails.
pub fn resolve_name(git: &Git<'_>, name: &str) -> Result<Option<String>, ExecError> {
    if let Some(id) = answer(git.rev_parse_short(name))? {
        return Ok(Some(id));
    }
    for remote in git.remotes()? {
        if let Some(id) = answer(git.rev_parse_short(&format!("{remote}/{name}")))? {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

/// The first candidate that resolves, with its commit id.
///
/// # Errors
/// Only when git itself cannot run.
pub fn first_resolved(
    git: &Git<'_>,
    candidates: &[Candidate],
) -> Result<Option<(CandidateSource, String)>, ExecError> {
    for candidate in candidates {
        match resolve_name(git, &candidate.name)? {
            Some(id) if !id.is_empty() => {
                tracing::debug!(
                    source = %candidate.source,
                    name = %candidate.name,
                    commit = %id,
                    "commit candidate resolved"
                );
                return Ok(Some((candidate.source, id)));
            }
            _ => {
                tracing::debug!(
                    source = %candidate.source,
                    name = %candidate.name,
                    "commit candidate did not resolve"
                );
            }
        }
    }
    Ok(None)
}

/// A command failure is an answer ("no"); anything else is a fault.
fn answer(result: Result<String, ExecError>) -> Result<Option<String>, ExecError> {
    match result {
        Ok(id) => Ok(Some(id)),
        Err(e) if e.is_command_failure() => Ok(None),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Resolve the target branch and commit.
///
/// # Errors
/// [`StageError::Resolution`] when no candidate resolves; [`StageError::Exec`]
/// when git cannot run.
pub fn resolve(
    git: &Git<'_>,
    inputs: &ResolveInputs<'_>,
    current_branch: &str,
) -> Result<Resolution, StageError> {
    let upstream = upstream_branches(git)?;
    let valid_declared = validate_declared(inputs.declared_branch, &upstream);
    if let Some(declared) = non_empty(inputs.declared_branch)
        && valid_declared.is_none()
    {
        tracing::debug!(declared, "patch branch is not an upstream branch; ignoring it");
    }

    let branch = resolve_branch(inputs.explicit_branch, valid_declared, current_branch);
    let candidates = commit_candidates(inputs, valid_declared);

    match first_resolved(git, &candidates)? {
        Some((commit_source, commit)) => Ok(Resolution {
            branch,
            commit,
            commit_source,
        }),
        None => Err(StageError::Resolution {
            candidates: candidates.into_iter().map(|c| c.name).collect(),
        }),
    }
}

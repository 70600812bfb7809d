//! Patch descriptor: an mbox-formatted patch and the branch it declares.
//!
//! The declared branch comes from the subject prefix of the first message,
//! e.g. `Subject: [PATCH v2, dunfell] foo: fix bar` declares `dunfell`.
//! Prefix tokens that describe the submission rather than a branch (`PATCH`,
//! `RFC`, `RESEND`, `v2`, `1/3`) are ignored.
//!
//! Whether the declared branch actually exists is not decided here; the
//! resolver checks it against the remote branches.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::StageError;

/// A patch to be probed and merged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patch {
    path: PathBuf,
    contents: Vec<u8>,
    branch: Option<String>,
}

impl Patch {
    /// Read a patch from disk.
    ///
    /// # Errors
    /// Returns [`StageError::Patch`] if the file cannot be read.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, StageError> {
        let path = path.into();
        let contents = std::fs::read(&path).map_err(|source| StageError::Patch {
            path: path.clone(),
            source,
        })?;
        Ok(Self::from_parts(path, contents))
    }

    /// Build a patch from contents already in memory. `path` is kept as the
    /// patch's identifier.
    pub fn from_parts(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        let contents = contents.into();
        let branch = declared_branch(&String::from_utf8_lossy(&contents));
        Self {
            path: path.into(),
            contents,
            branch,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw bytes, suitable for piping to `git am`.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// The branch named in the subject prefix, if any. Not validated.
    #[must_use]
    pub fn declared_branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

// ---------------------------------------------------------------------------
// Subject parsing
// ---------------------------------------------------------------------------

/// Extract the declared branch from an mbox blob.
#[must_use]
pub fn declared_branch(mbox: &str) -> Option<String> {
    let subject = first_subject(mbox)?;
    branch_from_subject(&subject)
}

/// The unfolded `Subject:` header of the first message.
fn first_subject(mbox: &str) -> Option<String> {
    let mut lines = mbox.lines().skip_while(|l| l.trim().is_empty()).peekable();
    if lines.peek().is_some_and(|l| l.starts_with("From ")) {
        lines.next();
    }

    let mut subject: Option<String> = None;
    for line in lines {
        if line.is_empty() {
            // End of the header block.
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some(s) = subject.as_mut() {
                s.push(' ');
                s.push_str(line.trim());
            }
            continue;
        }
        if subject.is_some() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("subject")
        {
            subject = Some(value.trim().to_owned());
        }
    }
    subject
}

/// First branch-like token of the leading `[...]` groups of a subject.
#[must_use]
pub fn branch_from_subject(subject: &str) -> Option<String> {
    prefix_tokens(subject)
        .into_iter()
        .find(|t| is_branch_token(t))
}

fn prefix_tokens(subject: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = subject.trim_start();
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(end) = inner.find(']') else {
            break;
        };
        tokens.extend(
            inner[..end]
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned),
        );
        rest = inner[end + 1..].trim_start();
    }
    tokens
}

/// Whether a subject-prefix token could name a branch.
#[must_use]
pub fn is_branch_token(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    if is_keyword(&lower) || is_version_tag(&lower) || is_series_counter(&lower) {
        return false;
    }
    !token.chars().any(char::is_whitespace)
}

/// `PATCH`, `RFC PATCH v3`, `RESEND`, `PATCHv2`: a keyword standing alone,
/// followed by whitespace, or glued to a version tag. `patches/next` and
/// `rfcomm-fix` are branch names.
fn is_keyword(lower: &str) -> bool {
    ["patch", "rfc", "resend"].iter().any(|k| {
        lower.strip_prefix(k).is_some_and(|rest| {
            rest.is_empty() || rest.starts_with(char::is_whitespace) || is_version_tag(rest)
        })
    })
}

/// `v2`, `v10`, `v3-rebased`: a `v` followed by at least one digit.
fn is_version_tag(lower: &str) -> bool {
    lower
        .strip_prefix('v')
        .and_then(|r| r.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

/// `1/3`, `02/10`: digits, slash, ...
fn is_series_counter(lower: &str) -> bool {
    let digits = lower.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && lower[digits..].starts_with('/')
}

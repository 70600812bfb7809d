//! Error types for command execution.
//!
//! [`ExecError`] separates "the tool could not run" ([`ExecError::Spawn`])
//! from "the tool ran and exited non-zero" ([`ExecError::Failed`]). Callers
//! that treat a non-zero exit as an answer rather than a fault (e.g. "does
//! this ref exist?") match on [`ExecError::is_command_failure`].

use thiserror::Error;

/// Errors returned by [`CommandRunner`](crate::CommandRunner) implementations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be started, or its pipes could not be driven.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// The rendered command line.
        command: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited with a non-zero status.
    #[error("`{command}` failed{}{}", exit_suffix(.code), output_suffix(.stdout, .stderr))]
    Failed {
        /// The rendered command line.
        command: String,
        /// Process exit code; `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured stdout, trimmed.
        stdout: String,
        /// Captured stderr, trimmed.
        stderr: String,
    },
}

impl ExecError {
    /// True when the command ran to completion and reported failure.
    #[must_use]
    pub const fn is_command_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The rendered command line that produced this error.
    #[must_use]
    pub fn command(&self) -> &str {
        match self {
            Self::Spawn { command, .. } | Self::Failed { command, .. } => command,
        }
    }
}

#[allow(clippy::ref_option)]
fn exit_suffix(code: &Option<i32>) -> String {
    code.map_or_else(
        || " (terminated by signal)".to_owned(),
        |c| format!(" (exit code {c})"),
    )
}

fn output_suffix(stdout: &str, stderr: &str) -> String {
    if !stderr.is_empty() {
        format!(": {stderr}")
    } else if !stdout.is_empty() {
        format!(": {stdout}")
    } else {
        String::new()
    }
}

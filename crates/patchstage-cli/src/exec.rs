use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Error indicating the child process exited with a non-zero status.
/// Carries the exit code for the caller to propagate.
#[derive(Debug)]
pub struct ExitCodeError(pub i32);

impl std::fmt::Display for ExitCodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "command exited with code {}", self.0)
    }
}

impl std::error::Error for ExitCodeError {}

/// Run `cmd` in `dir` with `env` added, inheriting stdio.
///
/// # Errors
/// Fails if the command is empty or cannot be spawned; a non-zero exit is
/// reported as [`ExitCodeError`].
pub fn run_in(dir: &Path, cmd: &[String], env: (&str, &Path)) -> Result<()> {
    let Some((program, args)) = cmd.split_first() else {
        bail!(
            "No command specified.\n  \
             Usage: patchstage run <patch> -- <command> [args...]\n  \
             Example: patchstage run 0001-fix.patch -- make test"
        );
    };

    let status = Command::new(program)
        .args(args)
        .current_dir(dir)
        .env(env.0, OsString::from(env.1))
        .status()
        .with_context(|| format!("Failed to run '{program}'"))?;

    if !status.success() {
        return Err(ExitCodeError(status.code().unwrap_or(1)).into());
    }
    Ok(())
}

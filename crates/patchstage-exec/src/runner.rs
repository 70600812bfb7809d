//! The [`CommandRunner`] trait and its `std::process` implementation.

use std::io::{self, Write as _};
use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::command::{CommandOutput, CommandSpec, trimmed};
use crate::error::ExecError;

/// Runs [`CommandSpec`]s against a working directory.
///
/// Implementations may spawn real processes ([`ProcessRunner`]) or replay a
/// script (test doubles). The trait is object-safe so the controller can hold
/// a `&dyn CommandRunner`.
pub trait CommandRunner {
    /// Run a single command in `cwd`, blocking until it exits.
    ///
    /// # Errors
    /// [`ExecError::Spawn`] if the process cannot be run, [`ExecError::Failed`]
    /// if it exits non-zero.
    fn run(&self, cwd: &Path, spec: &CommandSpec) -> Result<CommandOutput, ExecError>;

    /// Run commands in order, stopping at the first failure.
    ///
    /// # Errors
    /// The first command's error, unchanged. Commands after it never run.
    fn run_batch(
        &self,
        cwd: &Path,
        specs: &[CommandSpec],
    ) -> Result<Vec<CommandOutput>, ExecError> {
        specs.iter().map(|spec| self.run(cwd, spec)).collect()
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, cwd: &Path, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        (**self).run(cwd, spec)
    }
}

// ---------------------------------------------------------------------------
// ProcessRunner
// ---------------------------------------------------------------------------

/// Spawns real child processes.
///
/// The child inherits the parent's environment plus the command's extra
/// variables. Stdout and stderr are always captured. When the command carries a
/// stdin payload it is written from a scoped helper thread. A child that
/// fills its stdout pipe before draining stdin then cannot dead-lock the runner.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, cwd: &Path, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        let rendered = spec.to_string();
        tracing::trace!(command = %rendered, cwd = %cwd.display(), "spawning");

        let output = spawn_and_wait(cwd, spec).map_err(|source| ExecError::Spawn {
            command: rendered.clone(),
            source,
        })?;

        let code = output.status.code();
        if output.status.success() {
            Ok(CommandOutput::from_raw(
                rendered,
                code,
                &output.stdout,
                &output.stderr,
            ))
        } else {
            Err(ExecError::Failed {
                command: rendered,
                code,
                stdout: trimmed(&output.stdout),
                stderr: trimmed(&output.stderr),
            })
        }
    }
}

fn spawn_and_wait(cwd: &Path, spec: &CommandSpec) -> io::Result<Output> {
    let mut cmd = Command::new(spec.program());
    cmd.args(spec.arguments())
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in spec.env_vars() {
        cmd.env(key, value);
    }

    let Some(payload) = spec.stdin_payload() else {
        cmd.stdin(Stdio::null());
        return cmd.output();
    };

    cmd.stdin(Stdio::piped());
    let mut child = cmd.spawn()?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::other("child stdin was not captured"))?;

    std::thread::scope(|scope| {
        let writer = scope.spawn(move || {
            // Dropping `stdin` at the end of this closure closes the pipe.
            match stdin.write_all(payload) {
                // The child may exit before consuming everything (e.g. a
                // rejected patch); its exit status carries the real answer.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        });
        let output = child.wait_with_output();
        let written = writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
        let output = output?;
        written?;
        Ok(output)
    })
}

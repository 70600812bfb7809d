//! Command specifications and captured results.

use std::ffi::OsString;
use std::fmt;

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

/// One external invocation: program, arguments, optional stdin payload, and
/// extra environment variables layered over the inherited environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandSpec {
    program: OsString,
    args: Vec<OsString>,
    stdin: Option<Vec<u8>>,
    env: Vec<(OsString, OsString)>,
}

impl CommandSpec {
    /// Start a spec for `program` with no arguments.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Shorthand for `CommandSpec::new("git").args(args)`.
    pub fn git<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self::new("git").args(args)
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Bytes piped to the child's standard input.
    #[must_use]
    pub fn stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// Extra environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Replace the program, keeping arguments. Used to honour a configured
    /// git binary without rebuilding every spec.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    #[must_use]
    pub fn program(&self) -> &OsString {
        &self.program
    }

    #[must_use]
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    #[must_use]
    pub fn stdin_payload(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    #[must_use]
    pub fn env_vars(&self) -> &[(OsString, OsString)] {
        &self.env
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CommandOutput
// ---------------------------------------------------------------------------

/// The result of a command that exited successfully.
///
/// `stdout` and `stderr` are lossily decoded and trimmed at both ends. Inner
/// newlines survive so listings can be split with [`str::lines`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    /// The rendered command line.
    pub command: String,
    /// Exit code (always `Some(0)` for outputs returned as `Ok`).
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Build an output from raw captured bytes.
    #[must_use]
    pub fn from_raw(command: String, code: Option<i32>, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            command,
            code,
            stdout: trimmed(stdout),
            stderr: trimmed(stderr),
        }
    }
}

pub(crate) fn trimmed(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_owned()
}

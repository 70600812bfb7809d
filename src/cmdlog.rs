//! Command-log sinks.
//!
//! Every git batch the controller runs is reported to a [`CommandLog`]
//! after it finishes. The log is a diagnostic side channel: nothing in the
//! controller reads it back.
//!
//! - [`TracingLog`] forwards records to `tracing` at debug level. This is
//!   what production callers use.
//! - [`MemoryLog`] keeps records in memory, for tests and for the CLI's
//!   `--trace-commands` dump.

use std::sync::{Mutex, PoisonError};

use patchstage_exec::{CommandOutput, CommandSpec, ExecError};
use serde::Serialize;

/// One logged command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub command: String,
    /// `None` when the command failed to spawn, or for the commands of a
    /// failed batch other than the failing one.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub ok: bool,
}

/// Receives a report after each executed batch.
pub trait CommandLog {
    /// A batch completed; one output per command, in order.
    fn batch_succeeded(&self, outputs: &[CommandOutput]);

    /// A batch stopped at `error`. `specs` is the whole batch as submitted.
    fn batch_failed(&self, specs: &[CommandSpec], error: &ExecError);
}

// ---------------------------------------------------------------------------
// TracingLog
// ---------------------------------------------------------------------------

/// Forwards command records to `tracing::debug!`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLog;

impl CommandLog for TracingLog {
    fn batch_succeeded(&self, outputs: &[CommandOutput]) {
        for out in outputs {
            tracing::debug!(
                cmd = %out.command,
                rcode = ?out.code,
                stdout = %out.stdout,
                stderr = %out.stderr,
                "git command"
            );
        }
    }

    fn batch_failed(&self, specs: &[CommandSpec], error: &ExecError) {
        for spec in specs {
            tracing::debug!(cmd = %spec, "git command (failed batch)");
        }
        tracing::debug!(error = %error, "git batch failed");
    }
}

// ---------------------------------------------------------------------------
// MemoryLog
// ---------------------------------------------------------------------------

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<CommandRecord>>,
}

impl MemoryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    #[must_use]
    pub fn records(&self) -> Vec<CommandRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Just the command lines, in execution order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.command).collect()
    }

    fn push(&self, record: CommandRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

impl CommandLog for MemoryLog {
    fn batch_succeeded(&self, outputs: &[CommandOutput]) {
        for out in outputs {
            self.push(CommandRecord {
                command: out.command.clone(),
                code: out.code,
                stdout: out.stdout.clone(),
                stderr: out.stderr.clone(),
                ok: true,
            });
        }
    }

    fn batch_failed(&self, specs: &[CommandSpec], error: &ExecError) {
        for spec in specs {
            let command = spec.to_string();
            let record = match error {
                ExecError::Failed {
                    command: failed,
                    code,
                    stdout,
                    stderr,
                } if *failed == command => CommandRecord {
                    command,
                    code: *code,
                    stdout: stdout.clone(),
                    stderr: stderr.clone(),
                    ok: false,
                },
                ExecError::Spawn {
                    command: failed,
                    source,
                } if *failed == command => CommandRecord {
                    command,
                    code: None,
                    stdout: String::new(),
                    stderr: source.to_string(),
                    ok: false,
                },
                _ => CommandRecord {
                    command,
                    code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    ok: false,
                },
            };
            self.push(record);
        }
    }
}

/// Fans a report out to two sinks.
#[derive(Clone, Copy, Debug)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: CommandLog, B: CommandLog> CommandLog for Tee<A, B> {
    fn batch_succeeded(&self, outputs: &[CommandOutput]) {
        self.0.batch_succeeded(outputs);
        self.1.batch_succeeded(outputs);
    }

    fn batch_failed(&self, specs: &[CommandSpec], error: &ExecError) {
        self.0.batch_failed(specs, error);
        self.1.batch_failed(specs, error);
    }
}

impl<L: CommandLog + ?Sized> CommandLog for &L {
    fn batch_succeeded(&self, outputs: &[CommandOutput]) {
        (**self).batch_succeeded(outputs);
    }

    fn batch_failed(&self, specs: &[CommandSpec], error: &ExecError) {
        (**self).batch_failed(specs, error);
    }
}

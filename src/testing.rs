//! Scripted [`CommandRunner`] for unit tests.
//!
//! Responses are keyed by the rendered command line. Unknown commands fail
//! with exit code 1, which is what git does for most "no such thing" queries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use patchstage_exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};

#[derive(Clone, Debug)]
enum Reply {
    Ok(String),
    Fail,
    Spawn,
}

#[derive(Debug, Default)]
pub struct FakeRunner {
    replies: HashMap<String, Reply>,
    creates: HashMap<String, PathBuf>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(mut self, command: &str, stdout: &str) -> Self {
        self.replies
            .insert(command.to_owned(), Reply::Ok(stdout.to_owned()));
        self
    }

    pub fn fails(mut self, command: &str) -> Self {
        self.replies.insert(command.to_owned(), Reply::Fail);
        self
    }

    pub fn spawn_error(mut self, command: &str) -> Self {
        self.replies.insert(command.to_owned(), Reply::Spawn);
        self
    }

    /// Create the directory `dir` whenever `command` runs, whatever its
    /// reply. Simulates commands that leave state behind on disk.
    pub fn creates_dir(mut self, command: &str, dir: impl Into<PathBuf>) -> Self {
        self.creates.insert(command.to_owned(), dir.into());
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, _cwd: &Path, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        let command = spec.to_string();
        self.calls.lock().unwrap().push(command.clone());
        if let Some(dir) = self.creates.get(&command) {
            std::fs::create_dir_all(dir).unwrap();
        }
        match self.replies.get(&command) {
            Some(Reply::Ok(stdout)) => Ok(CommandOutput::from_raw(
                command,
                Some(0),
                stdout.as_bytes(),
                b"",
            )),
            Some(Reply::Spawn) => Err(ExecError::Spawn {
                command,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "git not found"),
            }),
            Some(Reply::Fail) | None => Err(ExecError::Failed {
                command,
                code: Some(1),
                stdout: String::new(),
                stderr: "scripted failure".to_owned(),
            }),
        }
    }
}

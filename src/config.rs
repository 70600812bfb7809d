//! Staging configuration (`.patchstage.toml`).
//!
//! Every field has a default, so a missing file or an empty table means
//! "behave like patchtest always did": isolated branches are named
//! `patchtest_<pid>`, a detached checkout is restored to `master`, and the
//! patch path is exported as `PTRESOURCE` while merging.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// File name looked up in the working directory when no explicit config
/// path is given.
pub const CONFIG_FILE_NAME: &str = ".patchstage.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level staging configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    #[serde(default)]
    pub isolation: IsolationConfig,

    #[serde(default)]
    pub repo: RepoConfig,

    #[serde(default)]
    pub apply: ApplyConfig,

    #[serde(default)]
    pub git: GitConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Isolated branch naming.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IsolationConfig {
    /// Prefix of the disposable branch; the process id is appended.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

fn default_prefix() -> String {
    "patchtest".to_owned()
}

/// Repository-level settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// Branch recorded as "original" when `HEAD` is detached at startup.
    /// `clean()` checks this branch out.
    #[serde(default = "default_detached_fallback")]
    pub detached_fallback: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            detached_fallback: default_detached_fallback(),
        }
    }
}

fn default_detached_fallback() -> String {
    "master".to_owned()
}

/// Patch application settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyConfig {
    /// Environment variable set to the patch path while `merge()` runs
    /// `git am`, so hooks can tell which artifact produced the commit.
    #[serde(default = "default_resource_env")]
    pub resource_env: String,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            resource_env: default_resource_env(),
        }
    }
}

fn default_resource_env() -> String {
    "PTRESOURCE".to_owned()
}

/// Git binary selection.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitConfig {
    #[serde(default = "default_program")]
    pub program: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
        }
    }
}

fn default_program() -> String {
    "git".to_owned()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading or parsing the configuration file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl StageConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Load `<workdir>/.patchstage.toml`, or the defaults if absent.
    ///
    /// # Errors
    /// See [`StageConfig::load`].
    pub fn load_from_workdir(workdir: &Path) -> Result<Self, ConfigError> {
        Self::load(&workdir.join(CONFIG_FILE_NAME))
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, or an empty
    /// isolation prefix.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;

        if cfg.isolation.prefix.trim().is_empty() {
            return Err(ConfigError {
                path: None,
                message: "isolation.prefix must not be empty".to_owned(),
            });
        }
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

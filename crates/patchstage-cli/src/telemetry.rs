//! Logging initialization.
//!
//! Controlled by two environment variables:
//! - `RUST_LOG` — standard `EnvFilter` directives (default `info`; use
//!   `patchstage=debug` to see every git command).
//! - `PATCHSTAGE_LOG_FORMAT` — `json` for one JSON object per event,
//!   anything else (or unset) for human-readable lines.
//!
//! Output always goes to stderr so stdout stays machine-readable.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Output format for log events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Read `PATCHSTAGE_LOG_FORMAT`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(std::env::var("PATCHSTAGE_LOG_FORMAT").ok().as_deref())
    }

    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Install the global subscriber. `verbose` raises the default level to
/// `debug` when `RUST_LOG` is unset.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("warning: logging already initialized: {e}");
    }
}

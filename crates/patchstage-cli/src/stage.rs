use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use patchstage::{
    CommandLog, MemoryLog, Overrides, Patch, RepoController, StageConfig, Tee, TracingLog,
};
use patchstage_exec::ProcessRunner;

use crate::exec;

/// Arguments shared by every subcommand.
#[derive(Args, Debug)]
pub struct StageArgs {
    /// Path to the mbox patch file
    pub patch: PathBuf,

    /// Repository working directory
    #[arg(short = 'C', long = "repo", default_value = ".")]
    pub repo: PathBuf,

    /// Commit to stage on (highest priority)
    #[arg(long)]
    pub commit: Option<String>,

    /// Branch to stage on (overrides the branch declared in the patch)
    #[arg(long)]
    pub branch: Option<String>,

    /// Config file (default: <repo>/.patchstage.toml)
    #[arg(long, env = "PATCHSTAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print every git command run as JSON to stdout after the summary
    #[arg(long)]
    pub trace_commands: bool,
}

impl StageArgs {
    fn load_config(&self) -> Result<StageConfig> {
        let config = match &self.config {
            Some(path) => StageConfig::load(path),
            None => StageConfig::load_from_workdir(&self.repo),
        };
        Ok(config?)
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            commit: self.commit.clone(),
            branch: self.branch.clone(),
        }
    }
}

/// What to do between staging and cleanup.
pub enum Action<'c> {
    /// Report and clean.
    Resolve,
    /// Report, clean, fail if the patch does not apply.
    Probe,
    /// Merge, run `cmd`, clean.
    Run(&'c [String]),
}

/// Stage `args.patch`, perform `action`, and always clean up.
///
/// # Errors
/// Staging, merge, cleanup, and command failures. A cleanup failure is
/// reported even when the action itself succeeded; when both fail, the
/// action's error wins and the cleanup error is logged.
pub fn run(args: &StageArgs, action: &Action<'_>) -> Result<()> {
    let config = args.load_config()?;
    let patch = Patch::from_file(absolute(&args.patch))?;

    let memory = MemoryLog::new();
    let tracing_log = TracingLog;
    let tee = Tee(&tracing_log, &memory);
    let log: &dyn CommandLog = if args.trace_commands { &tee } else { &tracing_log };

    let mut repo = RepoController::new(
        args.repo.clone(),
        patch,
        &args.overrides(),
        &config,
        &ProcessRunner,
        log,
    )
    .with_context(|| format!("Failed to stage {}", args.patch.display()))?;

    tracing::info!(
        branch = repo.branch(),
        commit = repo.commit(),
        applicable = repo.is_applicable(),
        "staged"
    );

    let outcome = perform(&mut repo, action, &config);
    let summary = repo.summary();
    let cleaned = repo
        .clean()
        .with_context(|| format!("Failed to restore {}", repo.original_branch()));

    print_json(&summary)?;
    if args.trace_commands {
        print_json(&memory.records())?;
    }

    match (outcome, cleaned) {
        (Err(e), Err(clean_err)) => {
            tracing::error!("{clean_err:#}");
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn perform(repo: &mut RepoController<'_>, action: &Action<'_>, config: &StageConfig) -> Result<()> {
    match action {
        Action::Resolve => Ok(()),
        Action::Probe => {
            if repo.is_applicable() {
                Ok(())
            } else {
                Err(exec::ExitCodeError(1).into())
            }
        }
        Action::Run(cmd) => {
            if !repo.is_applicable() {
                anyhow::bail!(
                    "Patch {} does not apply on {} ({})",
                    repo.patch_path().display(),
                    repo.branch(),
                    repo.commit()
                );
            }
            repo.merge().context("Failed to apply patch")?;
            exec::run_in(
                repo.workdir(),
                cmd,
                (&config.apply.resource_env, repo.patch_path()),
            )
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_owned())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

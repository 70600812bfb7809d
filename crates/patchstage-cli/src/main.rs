use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod exec;
mod stage;
mod telemetry;

/// Stage a patch on a disposable branch and test it
///
/// Every subcommand records the checked-out branch, resolves a target
/// branch and commit, creates `<prefix>_<pid>` at that commit, and checks
/// whether the patch applies. The original branch is always restored and
/// the disposable branch deleted before exit.
///
/// TARGET RESOLUTION (first match wins):
///
///   1. --commit
///   2. --branch
///   3. the branch named in the patch subject, e.g. [PATCH, release-1.2],
///      if it exists on a remote
///   4. HEAD
///
/// EXAMPLES:
///
///   patchstage probe 0001-fix.patch
///   patchstage resolve 0001-fix.patch --branch release-1.2
///   patchstage run 0001-fix.patch -C ../checkout -- make test
#[derive(Parser)]
#[command(name = "patchstage")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Debug-level logging when RUST_LOG is unset
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print where the patch would be staged, as JSON
    Resolve(stage::StageArgs),

    /// Check whether the patch applies; exit 1 if it does not
    Probe(stage::StageArgs),

    /// Apply the patch and run a command against the result
    ///
    /// The command runs in the repository with the patch path exported in
    /// the configured environment variable (default PTRESOURCE). Its exit
    /// code becomes patchstage's exit code.
    Run {
        #[command(flatten)]
        args: stage::StageArgs,

        /// Command and arguments to run
        #[arg(last = true, required = true)]
        cmd: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let result = match &cli.command {
        Commands::Resolve(args) => stage::run(args, &stage::Action::Resolve),
        Commands::Probe(args) => stage::run(args, &stage::Action::Probe),
        Commands::Run { args, cmd } => stage::run(args, &stage::Action::Run(cmd)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(exec::ExitCodeError(code)) = e.downcast_ref::<exec::ExitCodeError>() {
                return ExitCode::from(u8::try_from(*code).unwrap_or(1));
            }
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

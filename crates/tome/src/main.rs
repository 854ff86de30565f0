use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};

use tome_types::SourceId;

use crate::commands::ExitStatus;

mod commands;
mod logging;
mod printer;

#[derive(Parser)]
#[command(name = "tome", author, version)]
#[command(about = "A deterministic local cache of git-hosted documentation trees")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Do not print any log output.
    #[arg(global = true, long, short, conflicts_with = "verbose")]
    quiet: bool,

    /// Use verbose log output.
    #[arg(global = true, long, short, conflicts_with = "quiet")]
    verbose: bool,

    /// Path to the configuration file (`docs.config.json` or a
    /// `package.json` with a `docs-cache` key).
    #[arg(global = true, long)]
    config: Option<PathBuf>,

    /// Override the cache directory.
    #[arg(global = true, long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, filter, and cache every configured source.
    Sync(SyncArgs),
    /// Show what a sync would do, without executing it.
    Status(StatusArgs),
    /// Check cached trees against the lockfile's integrity hashes.
    Verify(JsonArgs),
    /// Remove cache entries for sources no longer in the config.
    Prune(JsonArgs),
    /// Remove the cache directory, or the shared git store with `--git`.
    Clean(CleanArgs),
    /// Pin each source's `ref` to the commit the lockfile records.
    Pin(SourcesArgs),
    /// Re-resolve and re-materialize sources, ignoring the lock.
    Update(SourcesArgs),
}

#[derive(Args)]
struct SyncArgs {
    /// Restrict the sync to these source ids.
    sources: Vec<SourceId>,

    /// Never touch the network; use locked commits and the local store.
    #[arg(long)]
    offline: bool,

    /// Fail when a required source cannot be satisfied.
    #[arg(long)]
    fail_on_miss: bool,

    /// Only update the lockfile; skip fetching and materialization.
    #[arg(long)]
    lock_only: bool,

    /// Fail if any source's resolved commit drifted from the lock.
    #[arg(long)]
    frozen: bool,

    /// Maximum number of sources synced in parallel.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Timeout for each external git operation, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct StatusArgs {
    /// Plan using locked commits instead of asking the remotes.
    #[arg(long)]
    offline: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct JsonArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CleanArgs {
    /// Clean the machine-wide git store instead of the project cache.
    #[arg(long)]
    git: bool,
}

#[derive(Args)]
struct SourcesArgs {
    /// Source ids to operate on; all sources when omitted.
    sources: Vec<SourceId>,

    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::from(0),
                _ => ExitStatus::InvalidArgument.into(),
            };
        }
    };

    if let Err(err) = logging::setup(cli.quiet, cli.verbose) {
        printer::error(&format!("failed to initialize logging: {err}"));
        return ExitStatus::Failure.into();
    }

    let result = run(cli).await;
    match result {
        Ok(status) => status.into(),
        Err(err) => {
            printer::error(&format!("{err:#}"));
            ExitStatus::Failure.into()
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitStatus> {
    let globals = commands::GlobalArgs {
        config: cli.config,
        cache_dir: cli.cache_dir,
    };
    match cli.command {
        Commands::Sync(args) => commands::sync(args, globals).await,
        Commands::Status(args) => commands::status(args, globals).await,
        Commands::Verify(args) => commands::verify(args, globals),
        Commands::Prune(args) => commands::prune(args, globals),
        Commands::Clean(args) => commands::clean(args, globals),
        Commands::Pin(args) => commands::pin(args, globals),
        Commands::Update(args) => commands::update(args, globals).await,
    }
}

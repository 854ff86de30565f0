use std::path::PathBuf;
use std::process::ExitCode;

pub(crate) use clean::clean;
pub(crate) use pin::pin;
pub(crate) use prune::prune;
pub(crate) use status::status;
pub(crate) use sync::sync;
pub(crate) use update::update;
pub(crate) use verify::verify;

use tome_sync::SyncOptions;

mod clean;
mod pin;
mod prune;
mod status;
mod sync;
mod update;
mod verify;

#[derive(Copy, Clone)]
pub(crate) enum ExitStatus {
    /// The command succeeded.
    Success,

    /// The command failed.
    Failure,

    /// The command was invoked with invalid arguments.
    InvalidArgument,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => ExitCode::from(0),
            ExitStatus::Failure => ExitCode::from(1),
            ExitStatus::InvalidArgument => ExitCode::from(9),
        }
    }
}

/// Flags shared by every subcommand.
pub(crate) struct GlobalArgs {
    pub(crate) config: Option<PathBuf>,
    pub(crate) cache_dir: Option<PathBuf>,
}

impl GlobalArgs {
    /// Baseline engine options from the global flags alone.
    pub(crate) fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            config_path: self.config.clone(),
            cache_dir_override: self.cache_dir.clone(),
            ..SyncOptions::default()
        }
    }
}

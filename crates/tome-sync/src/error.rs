use std::io;
use std::path::PathBuf;

use tome_types::SourceId;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] tome_config::ConfigError),

    #[error(transparent)]
    Lock(#[from] tome_lock::LockError),

    #[error(transparent)]
    Git(#[from] tome_git::GitError),

    #[error(transparent)]
    Materialize(#[from] tome_materialize::MaterializeError),

    #[error("frozen sync: source `{id}` resolved to {resolved} but the lock pins {locked}")]
    FrozenMismatch {
        id: SourceId,
        resolved: String,
        locked: String,
    },

    #[error("required source `{id}` is missing: no lock entry and no cached files")]
    MissingRequiredSource { id: SourceId },

    #[error("a background task failed: {0}")]
    TaskFailed(String),

    #[error("failed to write `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("source `{id}` exceeds its {field} limit ({actual} > {limit})")]
    LimitExceeded {
        id: String,
        field: &'static str,
        actual: u64,
        limit: u64,
    },

    #[error("materialized path `{}` escapes the cache directory", path.display())]
    PathTraversal { path: PathBuf },

    #[error("invalid filter pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid manifest line in `{}`: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Lock(#[from] tome_fs::LockError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

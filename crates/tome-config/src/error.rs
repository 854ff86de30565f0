use std::path::PathBuf;

use tome_types::SourceId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration found: neither `docs.config.json` nor a `docs-cache` key in `package.json` exists in `{}`", _0.display())]
    NotFound(PathBuf),

    #[error("failed to read `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{}` has no `docs-cache` key", _0.display())]
    MissingPackageKey(PathBuf),

    #[error("duplicate source id `{0}`")]
    DuplicateId(SourceId),

    #[error("source `{0}`: `include` must not be empty")]
    EmptyInclude(SourceId),

    #[error("source `{id}`: `{field}` must be at least 1")]
    BelowMinimum { id: SourceId, field: &'static str },

    #[error("cache dir `{}` escapes its root after normalization", _0.display())]
    UnsafeCacheDir(PathBuf),

    #[error("source `{id}`: target dir `{}` is not inside the config directory", path.display())]
    TargetOutsideConfigDir { id: SourceId, path: PathBuf },

    #[error("failed to write `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

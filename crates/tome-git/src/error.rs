use std::io;
use std::process::ExitStatus;

use crate::sparse::MAX_BRACE_EXPANSIONS;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to spawn `git`; is it installed and on PATH?")]
    Spawn(#[source] io::Error),

    #[error("`git {command}` failed with {status}:\n{stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`git {command}` timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },

    #[error("`git {command}` produced more than {limit} bytes of output")]
    OutputTooLarge { command: String, limit: usize },

    #[error("unsupported repository URL `{repo}`; expected `https://`, `ssh://`, or `git@host:path`")]
    UnsupportedRepoUrl { repo: String },

    #[error("host `{host}` of `{repo}` is not allowed (allowed: {allowed})")]
    HostNotAllowed {
        host: String,
        repo: String,
        allowed: String,
    },

    #[error("ref `{git_ref}` did not resolve to a commit in `{repo}`")]
    RefUnresolved { repo: String, git_ref: String },

    #[error("offline: no cached clone of `{repo}` exists")]
    CacheMissingOffline { repo: String },

    #[error("offline: the cached clone of `{repo}` is a partial clone and cannot be reused")]
    CachePartialOffline { repo: String },

    #[error("offline: commit {commit} is not present in the cached clone of `{repo}`")]
    CommitMissingOffline { repo: String, commit: String },

    #[error("commit {commit} not found in `{repo}` after fetching")]
    CommitNotFound { repo: String, commit: String },

    #[error("brace expansion produced {count} patterns, the limit is {MAX_BRACE_EXPANSIONS}")]
    BraceExpansionExceeded { count: usize },

    #[error("could not determine a cache directory for the shared git store")]
    NoCacheRoot,

    #[error(transparent)]
    Lock(#[from] tome_fs::LockError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

//! The orchestrator's seams.
//!
//! Resolution, fetching, and materialization are reached only through these
//! traits; tests swap in stubs to exercise the whole pipeline without a
//! network, a `git` binary, or a real store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tome_git::{FetchRequest, GitStore};
use tome_materialize::{MaterializeOutcome, MaterializeRequest};
use tome_types::SourceId;

use crate::SyncError;

#[derive(Debug, Clone)]
pub struct ResolveRequest<'a> {
    pub repo: &'a str,
    pub git_ref: &'a str,
    pub allow_hosts: &'a [String],
    pub timeout: Duration,
}

/// Resolves a remote ref to a commit SHA.
#[async_trait]
pub trait RefResolver: Send + Sync {
    async fn resolve(&self, req: ResolveRequest<'_>) -> Result<String, SyncError>;
}

#[derive(Debug, Clone)]
pub struct FetchTreeRequest<'a> {
    pub source_id: &'a SourceId,
    pub repo: &'a str,
    pub git_ref: &'a str,
    pub resolved_commit: &'a str,
    pub include: &'a [String],
    pub timeout: Duration,
    pub offline: bool,
}

/// A working directory at the pinned commit, plus its teardown.
#[async_trait]
pub trait FetchedTree: Send {
    fn work_dir(&self) -> &Path;
    fn from_cache(&self) -> bool;
    async fn cleanup(self: Box<Self>);
}

/// Produces working directories, normally through the shared git store.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, req: FetchTreeRequest<'_>) -> Result<Box<dyn FetchedTree>, SyncError>;
}

#[derive(Debug, Clone)]
pub struct MaterializeTreeRequest {
    pub source_id: SourceId,
    pub repo_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_bytes: u64,
    pub max_files: Option<u64>,
    pub ignore_hidden: bool,
    pub unwrap_single_root_dir: bool,
}

/// Filters and copies a working directory into the cache.
#[async_trait]
pub trait TreeMaterializer: Send + Sync {
    async fn materialize(
        &self,
        req: MaterializeTreeRequest,
    ) -> Result<MaterializeOutcome, SyncError>;
}

/// The bundle of collaborators `run_sync` works against.
#[derive(Clone)]
pub struct SyncDeps {
    pub resolver: Arc<dyn RefResolver>,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub materializer: Arc<dyn TreeMaterializer>,
    pub git_store: GitStore,
}

impl SyncDeps {
    /// The production wiring: external `git` for resolution and fetching,
    /// blocking materialization on the tokio blocking pool.
    pub fn production() -> Result<Self, SyncError> {
        let git_store = GitStore::from_environment().map_err(SyncError::Git)?;
        Ok(Self {
            resolver: Arc::new(GitRefResolver),
            fetcher: Arc::new(StoreFetcher {
                store: git_store.clone(),
            }),
            materializer: Arc::new(BlockingMaterializer),
            git_store,
        })
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn RefResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[must_use]
    pub fn with_materializer(mut self, materializer: Arc<dyn TreeMaterializer>) -> Self {
        self.materializer = materializer;
        self
    }
}

struct GitRefResolver;

#[async_trait]
impl RefResolver for GitRefResolver {
    async fn resolve(&self, req: ResolveRequest<'_>) -> Result<String, SyncError> {
        let resolved =
            tome_git::resolve_remote_commit(req.repo, req.git_ref, req.allow_hosts, req.timeout)
                .await?;
        Ok(resolved.resolved_commit)
    }
}

struct StoreFetcher {
    store: GitStore,
}

#[async_trait]
impl SourceFetcher for StoreFetcher {
    async fn fetch(&self, req: FetchTreeRequest<'_>) -> Result<Box<dyn FetchedTree>, SyncError> {
        let fetched = tome_git::fetch_source(
            &self.store,
            FetchRequest {
                source_id: req.source_id.as_str(),
                repo: req.repo,
                git_ref: req.git_ref,
                resolved_commit: req.resolved_commit,
                include: req.include,
                timeout: req.timeout,
                offline: req.offline,
            },
        )
        .await?;
        Ok(Box::new(GitFetchedTree {
            fetched: Some(fetched),
        }))
    }
}

struct GitFetchedTree {
    fetched: Option<tome_git::Fetched>,
}

#[async_trait]
impl FetchedTree for GitFetchedTree {
    fn work_dir(&self) -> &Path {
        self.fetched
            .as_ref()
            .map(tome_git::Fetched::work_dir)
            .unwrap_or(Path::new(""))
    }

    fn from_cache(&self) -> bool {
        self.fetched
            .as_ref()
            .is_some_and(tome_git::Fetched::from_cache)
    }

    async fn cleanup(mut self: Box<Self>) {
        if let Some(fetched) = self.fetched.take() {
            fetched.cleanup().await;
        }
    }
}

struct BlockingMaterializer;

#[async_trait]
impl TreeMaterializer for BlockingMaterializer {
    async fn materialize(
        &self,
        req: MaterializeTreeRequest,
    ) -> Result<MaterializeOutcome, SyncError> {
        let outcome = tokio::task::spawn_blocking(move || {
            tome_materialize::materialize_source(&MaterializeRequest {
                source_id: req.source_id.as_str(),
                repo_dir: &req.repo_dir,
                cache_dir: &req.cache_dir,
                include: &req.include,
                exclude: &req.exclude,
                max_bytes: req.max_bytes,
                max_files: req.max_files,
                ignore_hidden: req.ignore_hidden,
                unwrap_single_root_dir: req.unwrap_single_root_dir,
            })
        })
        .await
        .map_err(|err| SyncError::TaskFailed(err.to_string()))??;
        Ok(outcome)
    }
}

//! The shared bare-repo store and the per-source fetch pipeline.
//!
//! Every distinct repository URL gets one `--no-checkout` shallow clone
//! under an OS-appropriate cache root, shared across projects on the same
//! machine. Working directories are derived from it, either as detached
//! worktrees (reuse path) or as local `file://` clones (fresh-clone path),
//! so the store itself is never checked out or mutated by consumers.
//!
//! Partial clones are eradicated on sight: a store with `promisor` or
//! `partialclone` markers lazily fetches blobs over the network, which
//! breaks offline reuse, so it is deleted and recreated as a full clone.

use std::path::{Path, PathBuf};
use std::time::Duration;

use etcetera::BaseStrategy;
use tempfile::TempDir;
use tracing::{debug, warn};

use tome_cache_key::{store_digest, RepositoryUrl};
use tome_fs::FileLock;

use crate::git::{redact, GitCommand};
use crate::sparse::{plan_sparse, SparseSpec};
use crate::GitError;

/// Environment override for the store root.
const GIT_DIR_ENV: &str = "DOCS_CACHE_GIT_DIR";

/// Config keys that mark a partial clone.
const PARTIAL_CLONE_MARKERS: &[&str] = &["partialclone", "promisor", "partialclonefilter"];

/// How long a fetcher waits for another process mutating the same bare repo.
const STORE_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// The process-wide store of bare-ish clones. Explicitly constructed and
/// injected into the fetcher; never a module-level singleton.
#[derive(Debug, Clone)]
pub struct GitStore {
    root: PathBuf,
}

impl GitStore {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the store root: `DOCS_CACHE_GIT_DIR` if set, otherwise the
    /// user cache directory (`$XDG_CACHE_HOME`/`LOCALAPPDATA` family).
    pub fn from_environment() -> Result<Self, GitError> {
        if let Some(dir) = std::env::var_os(GIT_DIR_ENV) {
            return Ok(Self::at(PathBuf::from(dir)));
        }
        let strategy = etcetera::choose_base_strategy().map_err(|_| GitError::NoCacheRoot)?;
        Ok(Self::at(strategy.cache_dir().join("docs-cache").join("git-v0")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The bare clone directory for a repository.
    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        self.root.join(store_digest(&RepositoryUrl::parse(repo)))
    }
}

/// Inputs for fetching one source's pinned commit.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub source_id: &'a str,
    pub repo: &'a str,
    pub git_ref: &'a str,
    pub resolved_commit: &'a str,
    pub include: &'a [String],
    pub timeout: Duration,
    pub offline: bool,
}

/// A working directory holding the pinned commit's (sparse) files.
#[derive(Debug)]
pub struct Fetched {
    work_dir: PathBuf,
    from_cache: bool,
    worktree: Option<WorktreeHandle>,
    /// Owns the scratch space; dropped last.
    _temp: TempDir,
}

impl Fetched {
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Whether the store satisfied the request without touching the network.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Remove the worktree registration and the scratch directory. Also runs
    /// best-effort on drop; calling it explicitly surfaces nothing but keeps
    /// the store tidy even on cancellation paths.
    pub async fn cleanup(mut self) {
        if let Some(worktree) = self.worktree.take() {
            worktree.remove().await;
        }
        // `_temp` drops here, deleting the scratch root.
    }
}

/// A detached worktree registered in a store repo. Removal has to go through
/// `git worktree remove` or the store accumulates stale registrations.
#[derive(Debug)]
struct WorktreeHandle {
    store_dir: PathBuf,
    path: PathBuf,
    armed: bool,
}

impl WorktreeHandle {
    async fn remove(mut self) {
        self.armed = false;
        let result = GitCommand::new()
            .current_dir(&self.store_dir)
            .args(["worktree", "remove", "--force"])
            .arg(&self.path)
            .run()
            .await;
        if let Err(err) = result {
            debug!("failed to remove worktree at {}: {err}", self.path.display());
        }
    }
}

impl Drop for WorktreeHandle {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Last-resort synchronous cleanup for cancelled or failed jobs.
        let _ = std::process::Command::new("git")
            .arg("-C")
            .arg(&self.store_dir)
            .args(["worktree", "remove", "--force"])
            .arg(&self.path)
            .output();
    }
}

/// Produce a working directory containing `resolved_commit`, fetching
/// through the shared store.
pub async fn fetch_source(store: &GitStore, req: FetchRequest<'_>) -> Result<Fetched, GitError> {
    fs_err::create_dir_all(store.root())?;
    let repo_dir = store.repo_dir(req.repo);

    // Mutating operations on one bare repo must be serialized across
    // processes; worktree consumers of a settled store need no lock.
    let _lock = FileLock::acquire(repo_dir.with_extension("lock"), STORE_LOCK_TIMEOUT).await?;

    let mut from_cache = true;
    let mut recloned = false;

    if !is_valid_repo(&repo_dir, req.timeout).await {
        if req.offline {
            return Err(GitError::CacheMissingOffline {
                repo: redact(req.repo),
            });
        }
        populate_store(&repo_dir, &req).await?;
        from_cache = false;
        recloned = true;
    } else if has_partial_clone_markers(&repo_dir)? {
        if req.offline {
            return Err(GitError::CachePartialOffline {
                repo: redact(req.repo),
            });
        }
        warn!(
            "cached clone of {} is a partial clone; recreating it",
            redact(req.repo)
        );
        populate_store(&repo_dir, &req).await?;
        from_cache = false;
        recloned = true;
    }

    if !commit_exists(&repo_dir, req.resolved_commit, req.timeout).await {
        if req.offline {
            return Err(GitError::CommitMissingOffline {
                repo: redact(req.repo),
                commit: req.resolved_commit.to_string(),
            });
        }
        if !recloned {
            // Try to bring just the pinned commit in; not every server
            // allows fetching by SHA, so fall through to a reclone.
            let fetched = GitCommand::new()
                .current_dir(&repo_dir)
                .args(["fetch", "origin", req.resolved_commit, "--depth", "1"])
                .timeout(req.timeout)
                .run()
                .await;
            if let Err(err) = fetched {
                debug!("shallow fetch of {} failed: {err}", req.resolved_commit);
            }
            from_cache = false;
        }
        if !commit_exists(&repo_dir, req.resolved_commit, req.timeout).await {
            populate_store(&repo_dir, &req).await?;
            recloned = true;
            from_cache = false;
            if !commit_exists(&repo_dir, req.resolved_commit, req.timeout).await {
                return Err(GitError::CommitNotFound {
                    repo: redact(req.repo),
                    commit: req.resolved_commit.to_string(),
                });
            }
        }
    }

    let sparse = plan_sparse(req.include)?;
    let temp = tempfile::Builder::new()
        .prefix(&format!("tome-{}-", req.source_id))
        .tempdir()?;

    let fetched = if recloned {
        // A fresh store already sits at the right commit; a local clone is
        // cheaper and leaves no worktree registration behind.
        let work_dir = temp.path().join("checkout");
        local_clone(&repo_dir, &work_dir, req.timeout).await?;
        checkout(&work_dir, req.resolved_commit, sparse.as_ref(), req.timeout).await?;
        Fetched {
            work_dir,
            from_cache,
            worktree: None,
            _temp: temp,
        }
    } else {
        let work_dir = temp.path().join("worktree");
        GitCommand::new()
            .current_dir(&repo_dir)
            .args(["worktree", "add", "--detach", "--no-checkout"])
            .arg(&work_dir)
            .arg(req.resolved_commit)
            .timeout(req.timeout)
            .run()
            .await?;
        let worktree = WorktreeHandle {
            store_dir: repo_dir.clone(),
            path: work_dir.clone(),
            armed: true,
        };
        checkout(&work_dir, req.resolved_commit, sparse.as_ref(), req.timeout).await?;
        Fetched {
            work_dir,
            from_cache,
            worktree: Some(worktree),
            _temp: temp,
        }
    };

    Ok(fetched)
}

/// `git rev-parse --git-dir` as a liveness probe.
async fn is_valid_repo(repo_dir: &Path, timeout: Duration) -> bool {
    if !repo_dir.is_dir() {
        return false;
    }
    GitCommand::new()
        .current_dir(repo_dir)
        .args(["rev-parse", "--git-dir"])
        .timeout(timeout)
        .run()
        .await
        .is_ok()
}

/// Scan the clone's config for partial-clone markers.
fn has_partial_clone_markers(repo_dir: &Path) -> Result<bool, GitError> {
    for config in [repo_dir.join(".git").join("config"), repo_dir.join("config")] {
        match fs_err::read_to_string(&config) {
            Ok(contents) => {
                let contents = contents.to_lowercase();
                return Ok(PARTIAL_CLONE_MARKERS
                    .iter()
                    .any(|marker| contents.contains(marker)));
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(false)
}

async fn commit_exists(repo_dir: &Path, commit: &str, timeout: Duration) -> bool {
    GitCommand::new()
        .current_dir(repo_dir)
        .args(["cat-file", "-e"])
        .arg(format!("{commit}^{{commit}}"))
        .timeout(timeout)
        .run()
        .await
        .is_ok()
}

/// (Re)create the store clone: shallow, tagless, never checked out. A branch
/// or tag ref narrows the clone to that ref; if that fails (for example the
/// ref has since been deleted), retry against the default branch.
async fn populate_store(repo_dir: &Path, req: &FetchRequest<'_>) -> Result<(), GitError> {
    tome_fs::rm_rf(repo_dir)?;

    let attempt = |branch: Option<String>| {
        let mut command = GitCommand::new()
            .args([
                "clone",
                "--no-checkout",
                "--depth",
                "1",
                "--recurse-submodules=no",
                "--no-tags",
            ])
            .timeout(req.timeout);
        if let Some(branch) = branch {
            command = command.arg("--branch").arg(branch);
        }
        command.arg(req.repo).arg(repo_dir).run()
    };

    match branch_hint(req.git_ref) {
        Some(branch) => match attempt(Some(branch.to_string())).await {
            Ok(_) => Ok(()),
            Err(err) => {
                debug!("clone with --branch {branch} failed, retrying without: {err}");
                tome_fs::rm_rf(repo_dir)?;
                attempt(None).await.map(|_| ())
            }
        },
        None => attempt(None).await.map(|_| ()),
    }
}

/// A ref worth passing to `clone --branch`: branch and tag names, but not
/// `HEAD`, raw commits, or fully-qualified refs.
fn branch_hint(git_ref: &str) -> Option<&str> {
    if git_ref == "HEAD" || git_ref.starts_with("refs/") || looks_like_commit(git_ref) {
        None
    } else {
        Some(git_ref)
    }
}

fn looks_like_commit(git_ref: &str) -> bool {
    git_ref.len() == 40 && git_ref.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Clone the store into a scratch working directory over `file://`, the one
/// place that transport is permitted.
async fn local_clone(repo_dir: &Path, work_dir: &Path, timeout: Duration) -> Result<(), GitError> {
    let absolute = std::path::absolute(repo_dir)?;
    let file_url = format!("file://{}", tome_fs::to_posix(&absolute));
    GitCommand::new()
        .allow_file_protocol()
        .args(["clone", "--no-checkout", "--depth", "1", "--no-tags"])
        .arg(file_url)
        .arg(work_dir)
        .timeout(timeout)
        .run()
        .await?;
    Ok(())
}

/// Apply the sparse plan, then populate the working tree at the pinned
/// commit. Sparse rules must land before the checkout or the full tree gets
/// written once.
async fn checkout(
    work_dir: &Path,
    commit: &str,
    sparse: Option<&SparseSpec>,
    timeout: Duration,
) -> Result<(), GitError> {
    if let Some(spec) = sparse {
        GitCommand::new()
            .current_dir(work_dir)
            .args(spec.to_args())
            .timeout(timeout)
            .run()
            .await?;
    }
    GitCommand::new()
        .current_dir(work_dir)
        .args(["reset", "--hard", commit])
        .timeout(timeout)
        .run()
        .await?;
    Ok(())
}

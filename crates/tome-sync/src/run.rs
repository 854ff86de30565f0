//! The executing half of a sync: a bounded worker pool over the per-source
//! jobs the plan calls for, followed by the single lock and index write.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use jiff::Timestamp;
use serde::Serialize;
use tracing::{debug, warn};

use tome_lock::{write_lock, Lock, LockEntry};
use tome_materialize::{remove_toc, write_toc, TocContext};
use tome_types::{SourceId, TocMode};

use crate::deps::{FetchTreeRequest, MaterializeTreeRequest};
use crate::plan::{get_sync_plan, PlannedSource, SourceStatus};
use crate::{write_index, IndexEntry, IndexFile, SyncDeps, SyncError, TOOL_VERSION};

const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub config_path: Option<PathBuf>,
    pub cache_dir_override: Option<PathBuf>,
    /// Update the lockfile only; no fetch, materialize, target, or TOC work.
    pub lock_only: bool,
    /// Never touch the network; resolved commits come from the lock.
    pub offline: bool,
    pub fail_on_miss: bool,
    /// Refuse to proceed if any resolved commit drifted from the lock.
    pub frozen: bool,
    /// Disable the up-to-date short-circuit and re-materialize everything.
    pub refresh: bool,
    pub source_filter: Option<Vec<SourceId>>,
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            cache_dir_override: None,
            lock_only: false,
            offline: false,
            fail_on_miss: false,
            frozen: false,
            refresh: false,
            source_filter: None,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: tome_git::DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceAction {
    /// Nothing to do, or nothing doable (offline without a lock entry).
    Skipped,
    /// Fetched, materialized, targeted.
    Synced,
    /// Lockfile-only refresh.
    LockOnly,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResult {
    pub id: SourceId,
    pub status: SourceStatus,
    pub action: SourceAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub bytes: u64,
    pub file_count: u64,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub results: Vec<SourceResult>,
    pub lock_written: bool,
}

impl SyncReport {
    /// A run succeeds when no required source failed. Optional failures are
    /// reported but do not fail the run.
    pub fn success(&self) -> bool {
        !self
            .results
            .iter()
            .any(|result| result.required && result.action == SourceAction::Failed)
    }

    pub fn failed_required(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.required && result.action == SourceAction::Failed)
            .count()
    }
}

struct JobContext {
    deps: SyncDeps,
    cache_dir: PathBuf,
    lock_only: bool,
    offline: bool,
    refresh: bool,
    timeout: Duration,
}

/// Plan and execute a full sync.
///
/// Fatal conditions (bad config, frozen drift, offline fail-on-miss) error
/// out before any write. Per-source failures run to completion across the
/// rest of the pool and are reported in the [`SyncReport`]; the lockfile is
/// only written when every required source succeeded, or always in
/// lock-only mode.
pub async fn run_sync(options: &SyncOptions, deps: &SyncDeps) -> Result<SyncReport, SyncError> {
    let plan = get_sync_plan(options, deps).await?;

    if options.frozen {
        for planned in &plan.sources {
            if let Some(resolved) = &planned.resolved_commit {
                let locked = planned
                    .locked
                    .as_ref()
                    .map(|entry| entry.resolved_commit.as_str());
                if locked != Some(resolved.as_str()) {
                    return Err(SyncError::FrozenMismatch {
                        id: planned.source.id.clone(),
                        resolved: resolved.clone(),
                        locked: locked.unwrap_or("<unlocked>").to_string(),
                    });
                }
            }
        }
    }

    if options.offline && options.fail_on_miss {
        if let Some(planned) = plan.sources.iter().find(|planned| {
            planned.source.required && planned.is_unsatisfiable_offline(&plan.cache_dir)
        }) {
            return Err(SyncError::MissingRequiredSource {
                id: planned.source.id.clone(),
            });
        }
    }

    let context = Arc::new(JobContext {
        deps: deps.clone(),
        cache_dir: plan.cache_dir.clone(),
        lock_only: options.lock_only,
        offline: options.offline,
        refresh: options.refresh,
        timeout: options.timeout,
    });

    let mut outcomes = futures::stream::iter(
        plan.sources
            .into_iter()
            .enumerate()
            .map(|(index, planned)| {
                let context = Arc::clone(&context);
                async move {
                    let (result, entry, target_dir) = execute_source(planned, &context).await;
                    (index, result, entry, target_dir)
                }
            }),
    )
    .buffer_unordered(options.concurrency.max(1))
    .collect::<Vec<_>>()
    .await;
    outcomes.sort_by_key(|(index, ..)| *index);

    let mut results = Vec::with_capacity(outcomes.len());
    let mut new_entries = std::collections::BTreeMap::new();
    let mut target_dirs = std::collections::BTreeMap::new();
    for (_, result, entry, target_dir) in outcomes {
        if let Some(entry) = entry {
            new_entries.insert(result.id.as_str().to_string(), entry);
        }
        if let Some(target_dir) = target_dir {
            target_dirs.insert(result.id.as_str().to_string(), target_dir);
        }
        results.push(result);
    }

    let report_success = !results
        .iter()
        .any(|result| result.required && result.action == SourceAction::Failed);

    // Rebuild the lock from the current config's id set: synced sources get
    // their fresh entry, untouched ones carry their previous entry, and ids
    // that left the config are purged.
    let mut lock_written = false;
    if report_success || options.lock_only {
        let mut lock = Lock::new(TOOL_VERSION);
        for source in &plan.loaded.sources {
            let id = source.id.as_str();
            if let Some(entry) = new_entries.remove(id) {
                lock.sources.insert(id.to_string(), entry);
            } else if let Some(previous) = plan
                .lock
                .as_ref()
                .and_then(|lock| lock.sources.get(id))
            {
                lock.sources.insert(id.to_string(), previous.clone());
            }
        }
        write_lock(&plan.lock_path, &lock)?;
        lock_written = true;

        if report_success
            && !options.lock_only
            && plan.loaded.config.index.unwrap_or(true)
        {
            let index = IndexFile {
                generated_at: Timestamp::now(),
                sources: plan
                    .loaded
                    .sources
                    .iter()
                    .filter_map(|source| {
                        let entry = lock.sources.get(source.id.as_str())?;
                        Some(IndexEntry {
                            id: source.id.as_str().to_string(),
                            repo: entry.repo.clone(),
                            git_ref: entry.git_ref.clone(),
                            resolved_commit: entry.resolved_commit.clone(),
                            bytes: entry.bytes,
                            file_count: entry.file_count,
                            manifest_sha256: entry.manifest_sha256.clone(),
                            cache_path: tome_fs::to_posix(
                                plan.cache_dir.join(source.id.as_str()),
                            ),
                            target_dir: target_dirs
                                .get(source.id.as_str())
                                .map(tome_fs::to_posix),
                        })
                    })
                    .collect(),
            };
            write_index(&plan.cache_dir, &index)?;
        }
    }

    Ok(SyncReport {
        results,
        lock_written,
    })
}

/// `update`: re-resolve and re-materialize, ignoring the up-to-date
/// short-circuit. Thin over [`run_sync`].
pub async fn update_sources(
    options: &SyncOptions,
    deps: &SyncDeps,
    ids: Option<Vec<SourceId>>,
) -> Result<SyncReport, SyncError> {
    let mut options = options.clone();
    options.refresh = true;
    if ids.is_some() {
        options.source_filter = ids;
    }
    run_sync(&options, deps).await
}

async fn execute_source(
    planned: PlannedSource,
    context: &JobContext,
) -> (SourceResult, Option<LockEntry>, Option<PathBuf>) {
    let source = &planned.source;
    let mut result = SourceResult {
        id: source.id.clone(),
        status: planned.status,
        action: SourceAction::Skipped,
        commit: planned.resolved_commit.clone(),
        bytes: 0,
        file_count: 0,
        required: source.required,
        error: None,
    };

    if let Some(err) = &planned.resolve_error {
        result.action = SourceAction::Failed;
        result.error = Some(err.to_string());
        return (result, None, planned.target_dir);
    }

    let Some(commit) = planned.resolved_commit.clone() else {
        // Offline with nothing locked: optional sources skip silently,
        // required ones get a warning (and fail-on-miss already handled the
        // fatal case before any job ran).
        if source.required {
            warn!("skipping required source `{}`: offline with no lock entry", source.id);
        } else {
            debug!("skipping optional source `{}`: offline with no lock entry", source.id);
        }
        return (result, None, planned.target_dir);
    };

    if context.lock_only {
        // Carry forward whatever was known about the previous
        // materialization; a never-synced source gets zeros with the commit
        // standing in for the manifest hash.
        let entry = match &planned.locked {
            Some(previous) => LockEntry {
                repo: source.repo.clone(),
                git_ref: source.git_ref.clone(),
                resolved_commit: commit.clone(),
                bytes: previous.bytes,
                file_count: previous.file_count,
                manifest_sha256: previous.manifest_sha256.clone(),
                rules_sha256: Some(planned.rules_sha256.clone()),
                updated_at: Timestamp::now(),
            },
            None => LockEntry {
                repo: source.repo.clone(),
                git_ref: source.git_ref.clone(),
                resolved_commit: commit.clone(),
                bytes: 0,
                file_count: 0,
                manifest_sha256: commit.clone(),
                rules_sha256: Some(planned.rules_sha256.clone()),
                updated_at: Timestamp::now(),
            },
        };
        result.action = SourceAction::LockOnly;
        result.bytes = entry.bytes;
        result.file_count = entry.file_count;
        return (result, Some(entry), planned.target_dir);
    }

    if planned.status == SourceStatus::UpToDate && !context.refresh {
        if let Some(locked) = &planned.locked {
            result.bytes = locked.bytes;
            result.file_count = locked.file_count;
        }
        if let Err(err) = refresh_toc_if_needed(&planned, context, &commit) {
            debug!("TOC upkeep for `{}` failed: {err}", source.id);
        }
        return (result, None, planned.target_dir);
    }

    match sync_one(&planned, context, &commit).await {
        Ok(entry) => {
            result.action = SourceAction::Synced;
            result.bytes = entry.bytes;
            result.file_count = entry.file_count;
            (result, Some(entry), planned.target_dir)
        }
        Err(err) => {
            result.action = SourceAction::Failed;
            result.error = Some(err.to_string());
            (result, None, planned.target_dir)
        }
    }
}

/// Fetch, materialize, target, TOC. The fetched tree is cleaned up on every
/// path, including materialization failures.
async fn sync_one(
    planned: &PlannedSource,
    context: &JobContext,
    commit: &str,
) -> Result<LockEntry, SyncError> {
    let source = &planned.source;

    let fetched = context
        .deps
        .fetcher
        .fetch(FetchTreeRequest {
            source_id: &source.id,
            repo: &source.repo,
            git_ref: &source.git_ref,
            resolved_commit: commit,
            include: &source.include,
            timeout: context.timeout,
            offline: context.offline,
        })
        .await?;

    let outcome = context
        .deps
        .materializer
        .materialize(MaterializeTreeRequest {
            source_id: source.id.clone(),
            repo_dir: fetched.work_dir().to_path_buf(),
            cache_dir: context.cache_dir.clone(),
            include: source.include.clone(),
            exclude: source.exclude.clone(),
            max_bytes: source.max_bytes,
            max_files: source.max_files,
            ignore_hidden: source.ignore_hidden,
            unwrap_single_root_dir: source.unwrap_single_root_dir,
        })
        .await;
    fetched.cleanup().await;
    let outcome = outcome?;

    let source_dir = context.cache_dir.join(source.id.as_str());

    if let Some(target_dir) = &planned.target_dir {
        let source_dir = source_dir.clone();
        let target_dir = target_dir.clone();
        let mode = source.target_mode;
        let explicit = source.target_mode_explicit;
        tokio::task::spawn_blocking(move || {
            tome_materialize::apply_target_dir(&source_dir, &target_dir, mode, explicit)
        })
        .await
        .map_err(|err| SyncError::TaskFailed(err.to_string()))??;
    }

    {
        let source_dir = source_dir.clone();
        let toc = source.toc;
        let ctx_id = source.id.as_str().to_string();
        let ctx_repo = source.repo.clone();
        let ctx_ref = source.git_ref.clone();
        let ctx_commit = commit.to_string();
        tokio::task::spawn_blocking(move || {
            write_toc(
                &source_dir,
                &TocContext {
                    id: &ctx_id,
                    repo: &ctx_repo,
                    git_ref: &ctx_ref,
                    commit: &ctx_commit,
                },
                toc,
            )
        })
        .await
        .map_err(|err| SyncError::TaskFailed(err.to_string()))??;
    }

    Ok(LockEntry {
        repo: source.repo.clone(),
        git_ref: source.git_ref.clone(),
        resolved_commit: commit.to_string(),
        bytes: outcome.bytes,
        file_count: outcome.file_count,
        manifest_sha256: outcome.manifest_sha256,
        rules_sha256: Some(planned.rules_sha256.clone()),
        updated_at: Timestamp::now(),
    })
}

/// Up-to-date sources keep their `TOC.md` byte-for-byte; it is only touched
/// when the source has disabled it (remove) or it vanished (regenerate).
fn refresh_toc_if_needed(
    planned: &PlannedSource,
    context: &JobContext,
    commit: &str,
) -> Result<(), SyncError> {
    let source = &planned.source;
    let source_dir = context.cache_dir.join(source.id.as_str());
    let toc_path = source_dir.join(tome_materialize::TOC_FILE);

    if !source.toc.is_enabled() {
        remove_toc(&source_dir)?;
        return Ok(());
    }
    if matches!(source.toc, TocMode::Tree | TocMode::Compressed) && !toc_path.exists() {
        write_toc(
            &source_dir,
            &TocContext {
                id: source.id.as_str(),
                repo: &source.repo,
                git_ref: &source.git_ref,
                commit,
            },
            source.toc,
        )?;
    }
    Ok(())
}

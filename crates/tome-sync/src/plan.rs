//! The non-executing half of a sync: resolve every source and classify it
//! against the lockfile.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use tome_cache_key::sha256_hex;
use tome_config::{
    load_config, resolve_cache_dir, resolve_target_dir, LoadedConfig, ResolvedSource,
};
use tome_lock::{read_lock, resolve_lock_path, Lock, LockEntry};
use tome_materialize::MANIFEST_FILE;

use crate::run::SyncOptions;
use crate::{SyncDeps, SyncError};
use crate::deps::ResolveRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceStatus {
    /// Lock, rules, and cache all agree with the remote; nothing to do.
    UpToDate,
    /// A lock entry exists but the commit or the filter rules drifted.
    Changed,
    /// Never synced: no lock entry.
    Missing,
}

/// One source's slice of the plan.
#[derive(Debug)]
pub struct PlannedSource {
    pub source: ResolvedSource,
    /// Absolute target directory, when the source projects outward.
    pub target_dir: Option<PathBuf>,
    /// `None` when resolution failed, or offline with no lock entry.
    pub resolved_commit: Option<String>,
    pub rules_sha256: String,
    pub status: SourceStatus,
    pub locked: Option<LockEntry>,
    /// A resolution failure, surfaced during execution so that planning
    /// stays side-effect free and other sources still proceed.
    pub resolve_error: Option<SyncError>,
}

impl PlannedSource {
    /// Missing in the fail-on-miss sense: nothing locked and nothing cached.
    pub fn is_unsatisfiable_offline(&self, cache_dir: &Path) -> bool {
        self.locked.is_none() && !has_cached_manifest(cache_dir, self.source.id.as_str())
    }
}

#[derive(Debug)]
pub struct SyncPlan {
    pub loaded: LoadedConfig,
    pub cache_dir: PathBuf,
    pub lock_path: PathBuf,
    pub lock: Option<Lock>,
    pub sources: Vec<PlannedSource>,
}

/// Build the plan: load config and lock, resolve refs (or reuse locked
/// commits when offline), fingerprint filter rules, and classify each
/// source. Nothing on disk is touched.
pub async fn get_sync_plan(
    options: &SyncOptions,
    deps: &SyncDeps,
) -> Result<SyncPlan, SyncError> {
    let loaded = load_config(options.config_path.as_deref())?;
    let cache_dir = resolve_cache_dir(
        &loaded.resolved_path,
        loaded.config.cache_dir.as_deref(),
        options.cache_dir_override.as_deref(),
    )?;
    let lock_path = resolve_lock_path(&loaded.resolved_path);
    let lock = read_lock(&lock_path)?;

    let mut sources = Vec::new();
    for source in &loaded.sources {
        if let Some(filter) = &options.source_filter {
            if !filter.iter().any(|id| id == &source.id) {
                continue;
            }
        }
        sources.push(plan_source(source, &loaded, &cache_dir, lock.as_ref(), options, deps).await);
    }

    Ok(SyncPlan {
        loaded,
        cache_dir,
        lock_path,
        lock,
        sources,
    })
}

async fn plan_source(
    source: &ResolvedSource,
    loaded: &LoadedConfig,
    cache_dir: &Path,
    lock: Option<&Lock>,
    options: &SyncOptions,
    deps: &SyncDeps,
) -> PlannedSource {
    let locked = lock
        .and_then(|lock| lock.sources.get(source.id.as_str()))
        .cloned();

    let target_dir = match resolve_target_dir(&loaded.resolved_path, source) {
        Ok(target_dir) => target_dir,
        Err(err) => {
            return PlannedSource {
                source: source.clone(),
                target_dir: None,
                resolved_commit: None,
                rules_sha256: rules_sha256(source),
                status: if locked.is_some() {
                    SourceStatus::Changed
                } else {
                    SourceStatus::Missing
                },
                locked,
                resolve_error: Some(err.into()),
            };
        }
    };

    let (resolved_commit, resolve_error) = if options.offline {
        // Offline planning trusts the lock; a source that was never locked
        // has no commit to pin to.
        (
            locked.as_ref().map(|entry| entry.resolved_commit.clone()),
            None,
        )
    } else {
        let request = ResolveRequest {
            repo: &source.repo,
            git_ref: &source.git_ref,
            allow_hosts: &source.allow_hosts,
            timeout: options.timeout,
        };
        match deps.resolver.resolve(request).await {
            Ok(commit) => (Some(commit), None),
            Err(err) => (None, Some(err)),
        }
    };

    let rules = rules_sha256(source);
    let status = classify(
        source,
        cache_dir,
        locked.as_ref(),
        resolved_commit.as_deref(),
        &rules,
    );
    debug!("planned {}: {:?}", source.id, status);

    PlannedSource {
        source: source.clone(),
        target_dir,
        resolved_commit,
        rules_sha256: rules,
        status,
        locked,
        resolve_error,
    }
}

fn classify(
    source: &ResolvedSource,
    cache_dir: &Path,
    locked: Option<&LockEntry>,
    resolved_commit: Option<&str>,
    rules: &str,
) -> SourceStatus {
    let Some(locked) = locked else {
        return SourceStatus::Missing;
    };
    let up_to_date = resolved_commit == Some(locked.resolved_commit.as_str())
        && locked.rules_sha256.as_deref() == Some(rules)
        && has_cached_manifest(cache_dir, source.id.as_str());
    if up_to_date {
        SourceStatus::UpToDate
    } else {
        SourceStatus::Changed
    }
}

/// The cache still holds a materialization: the manifest exists and is
/// non-empty.
fn has_cached_manifest(cache_dir: &Path, id: &str) -> bool {
    fs_err::metadata(cache_dir.join(id).join(MANIFEST_FILE))
        .map(|metadata| metadata.len() > 0)
        .unwrap_or(false)
}

/// Fingerprint of everything that shapes the materialized tree besides the
/// commit itself. A rules change invalidates the cache even when the remote
/// did not move.
pub(crate) fn rules_sha256(source: &ResolvedSource) -> String {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct RulesFingerprint<'a> {
        include: &'a [String],
        exclude: &'a [String],
        unwrap_single_root_dir: bool,
        ignore_hidden: bool,
        max_bytes: u64,
        max_files: Option<u64>,
    }

    let fingerprint = RulesFingerprint {
        include: &source.include,
        exclude: &source.exclude,
        unwrap_single_root_dir: source.unwrap_single_root_dir,
        ignore_hidden: source.ignore_hidden,
        max_bytes: source.max_bytes,
        max_files: source.max_files,
    };
    // Canonical form: serde_json with fixed field order.
    sha256_hex(serde_json::to_string(&fingerprint).unwrap_or_default())
}

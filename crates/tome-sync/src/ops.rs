//! Maintenance operations over the cache: verify, prune, clean, pin.
//! All of them are thin over the config/lock models and the manifest reader.

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use tome_config::{load_config, resolve_cache_dir, write_config};
use tome_fs::{rm_rf, Removal};
use tome_git::GitStore;
use tome_lock::{read_lock, resolve_lock_path};
use tome_materialize::{manifest_digest, MANIFEST_FILE};
use tome_types::SourceId;

use crate::run::SyncOptions;
use crate::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyStatus {
    /// Manifest digest on disk matches the lock.
    Ok,
    /// The cache contents no longer hash to what the lock recorded.
    Drifted { expected: String, actual: String },
    /// The lock pins the source but its cache directory is gone or empty.
    MissingCache,
    /// The source has no lock entry yet.
    NotLocked,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEntry {
    pub id: SourceId,
    pub status: VerifyStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub entries: Vec<VerifyEntry>,
}

impl VerifyReport {
    pub fn ok(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| matches!(entry.status, VerifyStatus::Ok | VerifyStatus::NotLocked))
    }
}

/// Recompute each source's manifest digest from disk and compare it with the
/// lock. Read-only.
pub fn verify_cache(options: &SyncOptions) -> Result<VerifyReport, SyncError> {
    let loaded = load_config(options.config_path.as_deref())?;
    let cache_dir = resolve_cache_dir(
        &loaded.resolved_path,
        loaded.config.cache_dir.as_deref(),
        options.cache_dir_override.as_deref(),
    )?;
    let lock = read_lock(&resolve_lock_path(&loaded.resolved_path))?;

    let mut entries = Vec::new();
    for source in &loaded.sources {
        let locked = lock
            .as_ref()
            .and_then(|lock| lock.sources.get(source.id.as_str()));
        let status = match locked {
            None => VerifyStatus::NotLocked,
            Some(locked) => {
                let source_dir = cache_dir.join(source.id.as_str());
                if !source_dir.join(MANIFEST_FILE).is_file() {
                    VerifyStatus::MissingCache
                } else {
                    match manifest_digest(&source_dir) {
                        Ok(actual) if actual == locked.manifest_sha256 => VerifyStatus::Ok,
                        Ok(actual) => VerifyStatus::Drifted {
                            expected: locked.manifest_sha256.clone(),
                            actual,
                        },
                        Err(_) => VerifyStatus::MissingCache,
                    }
                }
            }
        };
        entries.push(VerifyEntry {
            id: source.id.clone(),
            status,
        });
    }

    Ok(VerifyReport { entries })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    pub reclaimed_bytes: u64,
}

/// Remove cache entries for sources that are no longer configured, along
/// with transient debris (`.tmp-*`, `*.bak-*`, leftover `*.lock` markers)
/// from interrupted runs.
pub fn prune_cache(options: &SyncOptions) -> Result<PruneReport, SyncError> {
    let loaded = load_config(options.config_path.as_deref())?;
    let cache_dir = resolve_cache_dir(
        &loaded.resolved_path,
        loaded.config.cache_dir.as_deref(),
        options.cache_dir_override.as_deref(),
    )?;

    let mut removed = Vec::new();
    let mut reclaimed = Removal::default();

    let entries = match fs_err::read_dir(&cache_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(PruneReport {
                removed,
                reclaimed_bytes: 0,
            })
        }
        Err(err) => return Err(err.into()),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        let keep = name == crate::INDEX_FILE
            || loaded
                .sources
                .iter()
                .any(|source| source.id.as_str() == name);
        if keep {
            continue;
        }

        let is_debris = name.starts_with(".tmp-")
            || name.contains(".bak-")
            || name.ends_with(".lock");
        let is_stale_dir = entry.file_type()?.is_dir();
        if is_debris || is_stale_dir {
            debug!("pruning {}", path.display());
            reclaimed += rm_rf(&path)?;
            removed.push(path);
        }
    }

    Ok(PruneReport {
        removed,
        reclaimed_bytes: reclaimed.bytes,
    })
}

/// Remove the entire cache directory.
pub fn clean_cache(options: &SyncOptions) -> Result<Removal, SyncError> {
    let loaded = load_config(options.config_path.as_deref())?;
    let cache_dir = resolve_cache_dir(
        &loaded.resolved_path,
        loaded.config.cache_dir.as_deref(),
        options.cache_dir_override.as_deref(),
    )?;
    Ok(rm_rf(cache_dir)?)
}

/// Remove the machine-wide bare-repo store.
pub fn clean_git_cache(store: &GitStore) -> Result<Removal, SyncError> {
    Ok(rm_rf(store.root())?)
}

/// Rewrite each (filtered) source's `ref` in the config to the commit the
/// lock pins, so future syncs are immune to the remote moving.
pub fn pin_sources(
    options: &SyncOptions,
    ids: Option<&[SourceId]>,
) -> Result<Vec<SourceId>, SyncError> {
    let mut loaded = load_config(options.config_path.as_deref())?;
    let lock_path = resolve_lock_path(&loaded.resolved_path);
    let lock = read_lock(&lock_path)?;

    let mut pinned = Vec::new();
    for source in &mut loaded.config.sources {
        if let Some(ids) = ids {
            if !ids.contains(&source.id) {
                continue;
            }
        }
        let Some(entry) = lock
            .as_ref()
            .and_then(|lock| lock.sources.get(source.id.as_str()))
        else {
            continue;
        };
        if source.git_ref.as_deref() != Some(entry.resolved_commit.as_str()) {
            source.git_ref = Some(entry.resolved_commit.clone());
            pinned.push(source.id.clone());
        }
    }

    if !pinned.is_empty() {
        write_config(&loaded)?;
    }
    Ok(pinned)
}

/// Resolve the git store exactly the way the fetcher does; exposed for the
/// clean command.
pub fn default_git_store() -> Result<GitStore, SyncError> {
    Ok(GitStore::from_environment()?)
}

use std::path::Path;

use jiff::Timestamp;
use serde::Serialize;

use crate::SyncError;

pub const INDEX_FILE: &str = "index.json";

/// `cacheDir/index.json`: a machine-readable summary of every synced source,
/// for tooling that wants to discover the cache without reading the lock.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFile {
    pub generated_at: Timestamp,
    pub sources: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub id: String,
    pub repo: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub resolved_commit: String,
    pub bytes: u64,
    pub file_count: u64,
    pub manifest_sha256: String,
    pub cache_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<String>,
}

pub fn write_index(cache_dir: &Path, index: &IndexFile) -> Result<(), SyncError> {
    let path = cache_dir.join(INDEX_FILE);
    let mut json = serde_json::to_string_pretty(index).map_err(|err| {
        SyncError::Write {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        }
    })?;
    json.push('\n');
    tome_fs::write_atomic(&path, json).map_err(|source| SyncError::Write { path, source })
}

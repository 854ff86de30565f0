use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// The only lockfile schema version this tool reads or writes.
pub const LOCK_VERSION: u32 = 1;

pub const LOCK_FILE: &str = "docs.lock";

/// The lockfile: one entry per configured source, pinning the resolved
/// commit and the integrity hashes of the materialized tree.
///
/// After a successful sync the key set of `sources` is exactly the id set of
/// the current config; entries for removed sources are purged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub version: u32,
    pub generated_at: Timestamp,
    pub tool_version: String,
    /// Keyed by source id. A `BTreeMap` keeps the serialized form sorted,
    /// which makes back-to-back syncs byte-identical.
    pub sources: BTreeMap<String, LockEntry>,
}

impl Lock {
    pub fn new(tool_version: impl Into<String>) -> Self {
        Self {
            version: LOCK_VERSION,
            generated_at: Timestamp::now(),
            tool_version: tool_version.into(),
            sources: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    pub repo: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// 40-hex commit SHA the ref resolved to.
    pub resolved_commit: String,
    pub bytes: u64,
    pub file_count: u64,
    /// SHA-256 over the ordered `.manifest.ndjson` lines.
    pub manifest_sha256: String,
    /// Fingerprint of the filter rules in effect. Absent in locks written by
    /// older versions; treated as drift when missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_sha256: Option<String>,
    pub updated_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("failed to read lockfile at `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid lockfile at `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported lockfile version {found} in `{}` (expected {LOCK_VERSION})", path.display())]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("lockfile entry `{id}` has malformed commit `{commit}` (expected 40 hex characters)")]
    MalformedCommit { id: String, commit: String },

    #[error("failed to write lockfile at `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The lockfile lives next to the config file, whichever form that takes.
pub fn resolve_lock_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(LOCK_FILE)
}

/// Read and validate the lockfile. A missing file is not an error; every
/// fresh checkout starts without one.
pub fn read_lock(path: &Path) -> Result<Option<Lock>, LockError> {
    let text = match fs_err::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LockError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let lock: Lock = serde_json::from_str(&text).map_err(|source| LockError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_lock(path, &lock)?;
    Ok(Some(lock))
}

/// Structural validation beyond what serde enforces.
pub fn validate_lock(path: &Path, lock: &Lock) -> Result<(), LockError> {
    if lock.version != LOCK_VERSION {
        return Err(LockError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: lock.version,
        });
    }
    for (id, entry) in &lock.sources {
        let commit = &entry.resolved_commit;
        if commit.len() != 40 || !commit.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(LockError::MalformedCommit {
                id: id.clone(),
                commit: commit.clone(),
            });
        }
    }
    Ok(())
}

/// Write the lockfile atomically: serialize to a sibling temp file, then
/// rename into place. The previous lockfile is never mutated in place.
pub fn write_lock(path: &Path, lock: &Lock) -> Result<(), LockError> {
    let mut json = serde_json::to_string_pretty(lock).map_err(|source| LockError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');
    tome_fs::write_atomic(path, json).map_err(|source| LockError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn entry(commit: &str) -> LockEntry {
        LockEntry {
            repo: "https://github.com/a/b".to_string(),
            git_ref: "HEAD".to_string(),
            resolved_commit: commit.to_string(),
            bytes: 5,
            file_count: 1,
            manifest_sha256: "deadbeef".to_string(),
            rules_sha256: Some("cafe".to_string()),
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn missing_lock_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_lock(&dir.path().join(LOCK_FILE)).unwrap().is_none());
    }

    #[test]
    fn round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);

        let mut lock = Lock::new("0.4.2");
        lock.sources
            .insert("docs".to_string(), entry(&"a".repeat(40)));
        write_lock(&path, &lock).unwrap();

        let read = read_lock(&path).unwrap().unwrap();
        assert_eq!(read, lock);
    }

    #[test]
    fn rejects_wrong_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        fs_err::write(
            &path,
            indoc! {r#"
                {
                  "version": 2,
                  "generatedAt": "2025-01-01T00:00:00Z",
                  "toolVersion": "0.4.2",
                  "sources": {}
                }
            "#},
        )
        .unwrap();
        assert!(matches!(
            read_lock(&path),
            Err(LockError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn rejects_malformed_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        let mut lock = Lock::new("0.4.2");
        lock.sources.insert("docs".to_string(), entry("abc123"));
        write_lock(&path, &lock).unwrap();
        assert!(matches!(
            read_lock(&path),
            Err(LockError::MalformedCommit { .. })
        ));
    }

    #[test]
    fn tolerates_missing_rules_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        fs_err::write(
            &path,
            format!(
                r#"{{
  "version": 1,
  "generatedAt": "2025-01-01T00:00:00Z",
  "toolVersion": "0.1.0",
  "sources": {{
    "docs": {{
      "repo": "https://github.com/a/b",
      "ref": "HEAD",
      "resolvedCommit": "{commit}",
      "bytes": 5,
      "fileCount": 1,
      "manifestSha256": "deadbeef",
      "updatedAt": "2025-01-01T00:00:00Z"
    }}
  }}
}}"#,
                commit = "a".repeat(40)
            ),
        )
        .unwrap();

        let lock = read_lock(&path).unwrap().unwrap();
        assert_eq!(lock.sources["docs"].rules_sha256, None);
    }

    #[test]
    fn lock_path_is_config_sibling() {
        assert_eq!(
            resolve_lock_path(Path::new("/project/docs.config.json")),
            Path::new("/project/docs.lock")
        );
        assert_eq!(
            resolve_lock_path(Path::new("/project/package.json")),
            Path::new("/project/docs.lock")
        );
    }
}

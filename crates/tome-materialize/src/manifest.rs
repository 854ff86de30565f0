use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use tome_cache_key::Sha256Digest;

use crate::MaterializeError;

/// One line per materialized file, newline-delimited JSON, sorted ascending
/// by `path`.
pub const MANIFEST_FILE: &str = ".manifest.ndjson";

/// `{"path": "<posix-relative>", "size": <bytes>}` — field order matters,
/// the serialized line feeds the manifest hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub size: u64,
}

/// Streams manifest lines to disk while folding them into a running
/// SHA-256. The final digest is the tree's `manifestSha256`.
pub(crate) struct ManifestWriter {
    writer: BufWriter<fs_err::File>,
    digest: Sha256Digest,
}

impl ManifestWriter {
    pub(crate) fn create(dir: &Path) -> std::io::Result<Self> {
        let file = fs_err::File::create(dir.join(MANIFEST_FILE))?;
        Ok(Self {
            writer: BufWriter::new(file),
            digest: Sha256Digest::new(),
        })
    }

    pub(crate) fn push(&mut self, entry: &ManifestEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.digest.update(&line);
        Ok(())
    }

    pub(crate) fn finish(mut self) -> std::io::Result<String> {
        self.writer.flush()?;
        Ok(self.digest.finish())
    }
}

/// Read a source's manifest back, in file order.
pub fn read_manifest(source_dir: &Path) -> Result<Vec<ManifestEntry>, MaterializeError> {
    let path = source_dir.join(MANIFEST_FILE);
    let reader = BufReader::new(fs_err::File::open(&path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line).map_err(|source| {
            MaterializeError::ManifestParse {
                path: path.clone(),
                source,
            }
        })?);
    }
    Ok(entries)
}

/// Recompute the manifest digest from disk, hashing the lines exactly as
/// they were written.
pub fn manifest_digest(source_dir: &Path) -> Result<String, MaterializeError> {
    let path = source_dir.join(MANIFEST_FILE);
    let mut reader = BufReader::new(fs_err::File::open(&path)?);
    let mut digest = Sha256Digest::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        digest.update(&line);
    }
    Ok(digest.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_field_order_is_stable() {
        let entry = ManifestEntry {
            path: "README.md".to_string(),
            size: 5,
        };
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"path":"README.md","size":5}"#
        );
    }

    #[test]
    fn writer_digest_matches_recomputation() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ManifestWriter::create(dir.path()).unwrap();
        writer
            .push(&ManifestEntry {
                path: "a.md".to_string(),
                size: 1,
            })
            .unwrap();
        writer
            .push(&ManifestEntry {
                path: "b/c.md".to_string(),
                size: 2,
            })
            .unwrap();
        let digest = writer.finish().unwrap();

        assert_eq!(manifest_digest(dir.path()).unwrap(), digest);
        let entries = read_manifest(dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "a.md");
    }
}

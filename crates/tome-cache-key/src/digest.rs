use sha2::{Digest, Sha256};

use crate::RepositoryUrl;

/// Compute the SHA-256 hex digest of a byte string.
///
/// Everything persisted by the cache (manifest hashes, rule fingerprints,
/// store directory names) goes through this function, so it must stay stable
/// across releases and platforms.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// The directory name of a repository inside the shared git store: the first
/// 16 hex characters of the SHA-256 of its canonical URL.
pub fn store_digest(repo: &RepositoryUrl) -> String {
    let mut digest = sha256_hex(repo.as_str());
    digest.truncate(16);
    digest
}

/// An incrementally-fed SHA-256, for hashing streams line by line.
#[derive(Default)]
pub struct Sha256Digest(Sha256);

impl Sha256Digest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: impl AsRef<[u8]>) {
        self.0.update(data.as_ref());
    }

    pub fn finish(self) -> String {
        hex::encode(self.0.finalize())
    }
}

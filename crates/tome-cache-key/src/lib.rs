pub use canonical_url::RepositoryUrl;
pub use digest::{sha256_hex, store_digest, Sha256Digest};

mod canonical_url;
mod digest;

pub use copy::{materialize_source, MaterializeOutcome, MaterializeRequest};
pub use error::MaterializeError;
pub use manifest::{manifest_digest, read_manifest, ManifestEntry, MANIFEST_FILE};
pub use plan::FilterPlan;
pub use target::apply_target_dir;
pub use toc::{remove_toc, write_toc, TocContext, TOC_FILE};

mod copy;
mod error;
mod manifest;
mod plan;
mod swap;
mod target;
mod toc;

pub use deps::{
    FetchTreeRequest, FetchedTree, MaterializeTreeRequest, RefResolver, ResolveRequest,
    SourceFetcher, SyncDeps, TreeMaterializer,
};
pub use error::SyncError;
pub use index::{write_index, IndexEntry, IndexFile, INDEX_FILE};
pub use ops::{
    clean_cache, clean_git_cache, default_git_store, pin_sources, prune_cache, verify_cache,
    PruneReport, VerifyEntry, VerifyReport, VerifyStatus,
};
pub use plan::{get_sync_plan, PlannedSource, SourceStatus, SyncPlan};
pub use run::{run_sync, update_sources, SourceAction, SourceResult, SyncOptions, SyncReport};

mod deps;
mod error;
mod index;
mod ops;
mod plan;
mod run;

/// Read once at startup from this workspace's own manifest.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::ConfigError;
pub use load::{
    load_config, resolve_cache_dir, resolve_target_dir, write_config, ConfigKind, LoadedConfig,
    DEFAULT_CONFIG_FILE, PACKAGE_JSON_KEY,
};
pub use model::{Config, Defaults, Integrity, IntegrityKind, SourceSpec};
pub use resolve::{ResolvedSource, DEFAULT_ALLOW_HOSTS, DEFAULT_INCLUDE, DEFAULT_MAX_BYTES};

mod error;
mod load;
mod model;
mod resolve;

use std::path::{Path, PathBuf};

use tracing::debug;

use tome_fs::{is_descendant, normalize_path, retains_parent_refs};

use crate::resolve::resolve_sources;
use crate::{Config, ConfigError, ResolvedSource};

pub const DEFAULT_CONFIG_FILE: &str = "docs.config.json";

/// The key under which the config may be embedded in `package.json`.
pub const PACKAGE_JSON_KEY: &str = "docs-cache";

const DEFAULT_CACHE_DIR: &str = ".docs";

/// Where a loaded config came from; write-back needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Standalone,
    PackageJson,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub resolved_path: PathBuf,
    pub kind: ConfigKind,
    pub sources: Vec<ResolvedSource>,
}

impl LoadedConfig {
    /// The directory all relative paths in the config resolve against.
    pub fn config_dir(&self) -> &Path {
        self.resolved_path.parent().unwrap_or(Path::new("."))
    }
}

/// Load and validate the configuration.
///
/// With an explicit `path`, a file named `package.json` is read as an
/// embedded config and anything else as a standalone file. Without one,
/// `docs.config.json` in the current directory wins over a `docs-cache` key
/// in `./package.json`.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let (resolved_path, kind) = match path {
        Some(path) => {
            let kind = if path.file_name().is_some_and(|name| name == "package.json") {
                ConfigKind::PackageJson
            } else {
                ConfigKind::Standalone
            };
            (path.to_path_buf(), kind)
        }
        None => {
            let standalone = PathBuf::from(DEFAULT_CONFIG_FILE);
            if standalone.is_file() {
                (standalone, ConfigKind::Standalone)
            } else {
                let package = PathBuf::from("package.json");
                if package.is_file() {
                    (package, ConfigKind::PackageJson)
                } else {
                    return Err(ConfigError::NotFound(
                        std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
                    ));
                }
            }
        }
    };

    let text = fs_err::read_to_string(&resolved_path).map_err(|source| ConfigError::Read {
        path: resolved_path.clone(),
        source,
    })?;

    let config = match kind {
        ConfigKind::Standalone => {
            serde_json::from_str::<Config>(&text).map_err(|source| ConfigError::Parse {
                path: resolved_path.clone(),
                source,
            })?
        }
        ConfigKind::PackageJson => {
            let package: serde_json::Value =
                serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: resolved_path.clone(),
                    source,
                })?;
            let embedded = package
                .get(PACKAGE_JSON_KEY)
                .ok_or_else(|| ConfigError::MissingPackageKey(resolved_path.clone()))?;
            serde_json::from_value::<Config>(embedded.clone()).map_err(|source| {
                ConfigError::Parse {
                    path: resolved_path.clone(),
                    source,
                }
            })?
        }
    };

    let sources = resolve_sources(&config)?;
    debug!(
        "loaded {} source(s) from {}",
        sources.len(),
        resolved_path.display()
    );

    Ok(LoadedConfig {
        config,
        resolved_path,
        kind,
        sources,
    })
}

/// Write the configuration back to where it was loaded from.
///
/// Standalone files are rewritten in full. For `package.json`, only the
/// `docs-cache` key is replaced; the rest of the file, including key order,
/// is preserved, and fields left at their defaults are never serialized so
/// the user's file stays minimal.
pub fn write_config(loaded: &LoadedConfig) -> Result<(), ConfigError> {
    let path = &loaded.resolved_path;
    let contents = match loaded.kind {
        ConfigKind::Standalone => {
            let mut json = serde_json::to_string_pretty(&loaded.config).map_err(|source| {
                ConfigError::Parse {
                    path: path.clone(),
                    source,
                }
            })?;
            json.push('\n');
            json
        }
        ConfigKind::PackageJson => {
            let text = fs_err::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let mut package: serde_json::Value =
                serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?;
            let embedded = serde_json::to_value(&loaded.config).map_err(|source| {
                ConfigError::Parse {
                    path: path.clone(),
                    source,
                }
            })?;
            let Some(object) = package.as_object_mut() else {
                return Err(ConfigError::MissingPackageKey(path.clone()));
            };
            object.insert(PACKAGE_JSON_KEY.to_string(), embedded);
            let mut json = serde_json::to_string_pretty(&package).map_err(|source| {
                ConfigError::Parse {
                    path: path.clone(),
                    source,
                }
            })?;
            json.push('\n');
            json
        }
    };

    tome_fs::write_atomic(path, contents).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })
}

/// Resolve the cache root: CLI override over config value over `.docs`,
/// relative paths anchored at the config directory. Anything that still
/// points outside its root after normalization is refused.
pub fn resolve_cache_dir(
    config_path: &Path,
    configured: Option<&str>,
    cli_override: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    let base = config_path.parent().unwrap_or(Path::new("."));
    let chosen = match cli_override {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(configured.unwrap_or(DEFAULT_CACHE_DIR)),
    };
    let joined = if chosen.is_absolute() {
        chosen
    } else {
        base.join(chosen)
    };
    let normalized = normalize_path(&joined);
    if retains_parent_refs(&normalized) {
        return Err(ConfigError::UnsafeCacheDir(normalized));
    }
    Ok(normalized)
}

/// Resolve a source's target directory against the config directory.
///
/// Relative targets must stay inside the config directory. Absolute targets
/// are taken as deliberate and may live anywhere, but must not themselves
/// traverse upward.
pub fn resolve_target_dir(
    config_path: &Path,
    source: &ResolvedSource,
) -> Result<Option<PathBuf>, ConfigError> {
    let Some(target) = source.target_dir.as_deref() else {
        return Ok(None);
    };
    let base = config_path.parent().unwrap_or(Path::new("."));
    let target_path = Path::new(target);

    let normalized = if target_path.is_absolute() {
        let normalized = normalize_path(target_path);
        if retains_parent_refs(&normalized) {
            return Err(ConfigError::TargetOutsideConfigDir {
                id: source.id.clone(),
                path: normalized,
            });
        }
        normalized
    } else {
        let normalized = normalize_path(base.join(target_path));
        if !is_descendant(base, &normalized) {
            return Err(ConfigError::TargetOutsideConfigDir {
                id: source.id.clone(),
                path: normalized,
            });
        }
        normalized
    };
    Ok(Some(normalized))
}

use tome_types::{SourceId, TargetMode, TocMode};

use crate::model::{Config, Defaults, Integrity, SourceSpec};
use crate::ConfigError;

/// The file types a documentation tree is usually made of.
pub const DEFAULT_INCLUDE: &[&str] = &["**/*.{md,mdx,markdown,mkd,txt,rst,adoc,asciidoc}"];

pub const DEFAULT_ALLOW_HOSTS: &[&str] = &["github.com", "gitlab.com"];

pub const DEFAULT_MAX_BYTES: u64 = 200_000_000;

const DEFAULT_REF: &str = "HEAD";

/// A source with every optional field materialized from the defaults chain.
/// Built fresh for each sync; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSource {
    pub id: SourceId,
    pub repo: String,
    pub git_ref: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub depth: u32,
    pub required: bool,
    pub max_bytes: u64,
    pub max_files: Option<u64>,
    /// Raw target path as written in config; resolved to an absolute path by
    /// [`crate::resolve_target_dir`].
    pub target_dir: Option<String>,
    pub target_mode: TargetMode,
    /// Whether the mode was chosen by the user rather than the OS default.
    /// An explicit symlink request that has to fall back to copying warrants
    /// a warning; a defaulted one does not.
    pub target_mode_explicit: bool,
    pub toc: TocMode,
    pub unwrap_single_root_dir: bool,
    pub ignore_hidden: bool,
    pub allow_hosts: Vec<String>,
    pub integrity: Option<Integrity>,
}

/// Merge defaults into every source and validate the result.
pub fn resolve_sources(config: &Config) -> Result<Vec<ResolvedSource>, ConfigError> {
    let defaults = config.defaults.clone().unwrap_or_default();

    let mut seen = std::collections::BTreeSet::new();
    let mut resolved = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        if !seen.insert(source.id.clone()) {
            return Err(ConfigError::DuplicateId(source.id.clone()));
        }
        resolved.push(resolve_source(source, config, &defaults)?);
    }
    Ok(resolved)
}

fn resolve_source(
    source: &SourceSpec,
    config: &Config,
    defaults: &Defaults,
) -> Result<ResolvedSource, ConfigError> {
    let include = source
        .include
        .clone()
        .or_else(|| defaults.include.clone())
        .unwrap_or_else(|| DEFAULT_INCLUDE.iter().map(ToString::to_string).collect());
    if include.is_empty() {
        return Err(ConfigError::EmptyInclude(source.id.clone()));
    }

    let depth = source.depth.or(defaults.depth).unwrap_or(1);
    if depth < 1 {
        return Err(ConfigError::BelowMinimum {
            id: source.id.clone(),
            field: "depth",
        });
    }

    let max_bytes = source
        .max_bytes
        .or(defaults.max_bytes)
        .unwrap_or(DEFAULT_MAX_BYTES);
    if max_bytes < 1 {
        return Err(ConfigError::BelowMinimum {
            id: source.id.clone(),
            field: "maxBytes",
        });
    }

    let max_files = source.max_files.or(defaults.max_files);
    if max_files.is_some_and(|limit| limit < 1) {
        return Err(ConfigError::BelowMinimum {
            id: source.id.clone(),
            field: "maxFiles",
        });
    }

    // `source > config > defaults > OS default`.
    let explicit_mode = source
        .target_mode
        .or(config.target_mode)
        .or(defaults.target_mode);

    Ok(ResolvedSource {
        id: source.id.clone(),
        repo: source.repo.clone(),
        git_ref: source
            .git_ref
            .clone()
            .or_else(|| defaults.git_ref.clone())
            .unwrap_or_else(|| DEFAULT_REF.to_string()),
        include,
        exclude: source
            .exclude
            .clone()
            .or_else(|| defaults.exclude.clone())
            .unwrap_or_default(),
        depth,
        required: source.required.or(defaults.required).unwrap_or(true),
        max_bytes,
        max_files,
        target_dir: source.target_dir.clone(),
        target_mode: explicit_mode.unwrap_or_else(TargetMode::os_default),
        target_mode_explicit: explicit_mode.is_some(),
        toc: source.toc.or(defaults.toc).unwrap_or_default(),
        unwrap_single_root_dir: source
            .unwrap_single_root_dir
            .or(defaults.unwrap_single_root_dir)
            .unwrap_or(true),
        ignore_hidden: source
            .ignore_hidden
            .or(defaults.ignore_hidden)
            .unwrap_or(false),
        allow_hosts: defaults.allow_hosts.clone().unwrap_or_else(|| {
            DEFAULT_ALLOW_HOSTS.iter().map(ToString::to_string).collect()
        }),
        integrity: source.integrity.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(source: SourceSpec) -> Config {
        Config {
            sources: vec![source],
            ..Config::default()
        }
    }

    fn id(id: &str) -> SourceId {
        SourceId::new(id).unwrap()
    }

    #[test]
    fn bare_source_gets_all_defaults() {
        let config = config_with(SourceSpec::new(id("docs"), "https://github.com/a/b"));
        let resolved = resolve_sources(&config).unwrap();
        let source = &resolved[0];

        assert_eq!(source.git_ref, "HEAD");
        assert_eq!(source.include, DEFAULT_INCLUDE);
        assert!(source.exclude.is_empty());
        assert_eq!(source.depth, 1);
        assert!(source.required);
        assert_eq!(source.max_bytes, DEFAULT_MAX_BYTES);
        assert_eq!(source.max_files, None);
        assert_eq!(source.target_mode, TargetMode::os_default());
        assert!(!source.target_mode_explicit);
        assert_eq!(source.toc, TocMode::Tree);
        assert!(source.unwrap_single_root_dir);
        assert!(!source.ignore_hidden);
        assert_eq!(source.allow_hosts, DEFAULT_ALLOW_HOSTS);
    }

    #[test]
    fn source_overrides_beat_defaults() {
        let mut source = SourceSpec::new(id("docs"), "https://github.com/a/b");
        source.git_ref = Some("v2".to_string());
        source.include = Some(vec!["docs/**".to_string()]);
        let mut config = config_with(source);
        config.defaults = Some(Defaults {
            git_ref: Some("main".to_string()),
            max_files: Some(10),
            ..Defaults::default()
        });

        let resolved = resolve_sources(&config).unwrap();
        assert_eq!(resolved[0].git_ref, "v2");
        assert_eq!(resolved[0].include, ["docs/**"]);
        assert_eq!(resolved[0].max_files, Some(10));
    }

    #[test]
    fn target_mode_precedence() {
        let mut source = SourceSpec::new(id("docs"), "https://github.com/a/b");
        source.target_mode = Some(TargetMode::Copy);
        let mut config = config_with(source);
        config.target_mode = Some(TargetMode::Symlink);

        let resolved = resolve_sources(&config).unwrap();
        assert_eq!(resolved[0].target_mode, TargetMode::Copy);
        assert!(resolved[0].target_mode_explicit);

        let config = config_with(SourceSpec::new(id("docs"), "https://github.com/a/b"));
        let resolved = resolve_sources(&config).unwrap();
        assert!(!resolved[0].target_mode_explicit);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut config = config_with(SourceSpec::new(id("docs"), "https://github.com/a/b"));
        config
            .sources
            .push(SourceSpec::new(id("docs"), "https://github.com/a/c"));
        assert!(matches!(
            resolve_sources(&config),
            Err(ConfigError::DuplicateId(_))
        ));
    }

    #[test]
    fn empty_include_is_rejected() {
        let mut source = SourceSpec::new(id("docs"), "https://github.com/a/b");
        source.include = Some(vec![]);
        assert!(matches!(
            resolve_sources(&config_with(source)),
            Err(ConfigError::EmptyInclude(_))
        ));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut source = SourceSpec::new(id("docs"), "https://github.com/a/b");
        source.max_bytes = Some(0);
        assert!(matches!(
            resolve_sources(&config_with(source)),
            Err(ConfigError::BelowMinimum { field: "maxBytes", .. })
        ));
    }
}

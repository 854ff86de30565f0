use serde::{Deserialize, Serialize};

use tome_types::{SourceId, TargetMode, TocMode};

/// The on-disk configuration, either a standalone `docs.config.json` or the
/// `docs-cache` object inside `package.json`.
///
/// The schema is strict: unknown keys are rejected rather than silently
/// ignored, so typos surface immediately. Every field except `sources` is
/// optional, and omitted fields stay omitted on write-back to keep user
/// files minimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    /// Informational; preserved on write.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// The cache root, resolved relative to the config file. Defaults to
    /// `.docs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    /// Default target mode for all sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_mode: Option<TargetMode>,

    /// Whether to write `index.json` under the cache root after a sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSpec>,
}

/// Per-config defaults, merged into every source that does not override the
/// field itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Defaults {
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    /// Clone depth; advisory, the fetcher always works shallow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u64>,

    /// Host allowlist; only honored at defaults scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_hosts: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub toc: Option<TocMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unwrap_single_root_dir: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_hidden: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_mode: Option<TargetMode>,
}

/// A declared, unresolved source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SourceSpec {
    pub id: SourceId,

    /// `https://`, `ssh://`, or `git@host:path`.
    pub repo: String,

    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u64>,

    /// Resolved relative to the config file; must not escape the config
    /// directory unless given as an absolute path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_mode: Option<TargetMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub toc: Option<TocMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unwrap_single_root_dir: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_hidden: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<Integrity>,
}

impl SourceSpec {
    /// A bare source with nothing but an id and a repo; everything else
    /// falls back to defaults.
    pub fn new(id: SourceId, repo: impl Into<String>) -> Self {
        Self {
            id,
            repo: repo.into(),
            git_ref: None,
            include: None,
            exclude: None,
            depth: None,
            required: None,
            max_bytes: None,
            max_files: None,
            target_dir: None,
            target_mode: None,
            toc: None,
            unwrap_single_root_dir: None,
            ignore_hidden: None,
            integrity: None,
        }
    }
}

/// An optional integrity pin for a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Integrity {
    #[serde(rename = "type")]
    pub kind: IntegrityKind,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityKind {
    Commit,
    Manifest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_are_rejected() {
        let err = serde_json::from_str::<Config>(r#"{"cacheDirr": ".docs"}"#).unwrap_err();
        assert!(err.to_string().contains("cacheDirr"), "{err}");

        let err = serde_json::from_str::<Config>(
            r#"{"sources": [{"id": "a", "repo": "https://github.com/a/a", "branch": "main"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("branch"), "{err}");
    }

    #[test]
    fn schema_key_round_trips() {
        let config: Config =
            serde_json::from_str(r#"{"$schema": "https://example.com/schema.json"}"#).unwrap();
        assert_eq!(config.schema.as_deref(), Some("https://example.com/schema.json"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("$schema"), "{json}");
    }

    #[test]
    fn omitted_fields_stay_omitted() {
        let config: Config = serde_json::from_str(
            r#"{"sources": [{"id": "a", "repo": "git@github.com:a/a.git"}]}"#,
        )
        .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"sources":[{"id":"a","repo":"git@github.com:a/a.git"}]}"#);
    }
}

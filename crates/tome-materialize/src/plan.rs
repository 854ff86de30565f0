//! Compilation of include/exclude patterns into a file filter.
//!
//! The glob dialect is globset's: `**` crosses directories, `{a,b}` braces
//! alternate, dotfiles match plain globs, and parentheses are literal (there
//! is no extglob). Patterns that arrive URL-encoded, typically pasted from a
//! browser, are percent-decoded once before compilation.

use std::borrow::Cow;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use percent_encoding::percent_decode_str;

use crate::MaterializeError;

/// Negative patterns appended when hidden entries are ignored.
const HIDDEN_PATTERNS: &[&str] = &[".*", "**/.*", "**/.*/**"];

/// A compiled include/exclude filter over POSIX-relative paths.
#[derive(Debug)]
pub struct FilterPlan {
    include: GlobSet,
    exclude: GlobSet,
}

impl FilterPlan {
    pub fn new(
        include: &[String],
        exclude: &[String],
        ignore_hidden: bool,
    ) -> Result<Self, MaterializeError> {
        let mut include_builder = GlobSetBuilder::new();
        for pattern in include {
            include_builder.add(compile(pattern)?);
        }

        let mut exclude_builder = GlobSetBuilder::new();
        for pattern in exclude {
            exclude_builder.add(compile(pattern)?);
        }
        if ignore_hidden {
            for pattern in HIDDEN_PATTERNS {
                exclude_builder.add(compile(pattern)?);
            }
        }

        Ok(Self {
            include: include_builder.build().map_err(|source| {
                MaterializeError::Pattern {
                    pattern: include.join(", "),
                    source,
                }
            })?,
            exclude: exclude_builder.build().map_err(|source| {
                MaterializeError::Pattern {
                    pattern: exclude.join(", "),
                    source,
                }
            })?,
        })
    }

    /// Whether a POSIX-relative path survives the filter.
    pub fn matches(&self, path: &str) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }
}

fn compile(pattern: &str) -> Result<globset::Glob, MaterializeError> {
    let normalized = normalize(pattern);
    GlobBuilder::new(&normalized)
        .literal_separator(true)
        .build()
        .map_err(|source| MaterializeError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn normalize(pattern: &str) -> String {
    let pattern = pattern.replace('\\', "/");
    if looks_url_encoded(&pattern) {
        match percent_decode_str(&pattern).decode_utf8() {
            Ok(Cow::Owned(decoded)) => return decoded,
            Ok(Cow::Borrowed(_)) | Err(_) => {}
        }
    }
    pattern
}

/// A `%` followed by two hex digits marks a pattern that went through URL
/// encoding somewhere along the way.
fn looks_url_encoded(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    bytes.windows(3).any(|window| {
        window[0] == b'%' && window[1].is_ascii_hexdigit() && window[2].is_ascii_hexdigit()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(include: &[&str], exclude: &[&str], ignore_hidden: bool) -> FilterPlan {
        let include = include.iter().map(ToString::to_string).collect::<Vec<_>>();
        let exclude = exclude.iter().map(ToString::to_string).collect::<Vec<_>>();
        FilterPlan::new(&include, &exclude, ignore_hidden).unwrap()
    }

    #[test]
    fn default_docs_pattern_matches_docs() {
        let plan = plan(&["**/*.{md,mdx,markdown,mkd,txt,rst,adoc,asciidoc}"], &[], false);
        assert!(plan.matches("README.md"));
        assert!(plan.matches("docs/guide/install.mdx"));
        assert!(plan.matches("notes.txt"));
        assert!(plan.matches("api/index.rst"));
        assert!(!plan.matches("src/main.rs"));
        assert!(!plan.matches("Makefile"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let plan = plan(&["**/*.md"], &["drafts/**"], false);
        assert!(plan.matches("docs/final.md"));
        assert!(!plan.matches("drafts/wip.md"));
    }

    #[test]
    fn hidden_entries_are_filtered_when_asked() {
        let visible = plan(&["**/*.md"], &[], false);
        assert!(visible.matches(".github/README.md"));

        let hidden = plan(&["**/*.md"], &[], true);
        assert!(!hidden.matches(".hidden.md"));
        assert!(!hidden.matches("docs/.hidden.md"));
        assert!(!hidden.matches(".github/README.md"));
        assert!(hidden.matches("docs/visible.md"));
    }

    #[test]
    fn url_encoded_patterns_are_decoded_once() {
        let encoded_plan = plan(&["docs%2F**%2F*.md"], &[], false);
        assert!(encoded_plan.matches("docs/guide/intro.md"));

        // A literal `%` that is not an escape survives untouched.
        let literal_plan = plan(&["100%/*.md"], &[], false);
        assert!(literal_plan.matches("100%/notes.md"));
    }

    #[test]
    fn parentheses_are_literal() {
        let plan = plan(&["docs/(draft)/*.md"], &[], false);
        assert!(plan.matches("docs/(draft)/a.md"));
        assert!(!plan.matches("docs/draft/a.md"));
    }

    #[test]
    fn backslashes_normalize_to_slashes() {
        let plan = plan(&["docs\\**\\*.md"], &[], false);
        assert!(plan.matches("docs/a/b.md"));
    }
}

//! Sparse-checkout planning.
//!
//! Include patterns are compiled into a `git sparse-checkout set` plan ahead
//! of the final detached checkout, so only the files a source can match are
//! ever written to disk. Cone mode is used when every pattern is a plain
//! directory prefix; anything resembling a glob falls back to no-cone
//! pattern mode.

use crate::GitError;

/// Upper bound on patterns produced by brace expansion, across the whole
/// include list.
pub const MAX_BRACE_EXPANSIONS: usize = 500;

/// The plan handed to `git sparse-checkout set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseSpec {
    pub cone: bool,
    pub patterns: Vec<String>,
}

impl SparseSpec {
    /// The argv tail of the `git` invocation applying this plan.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["sparse-checkout".to_string(), "set".to_string()];
        args.push(if self.cone { "--cone" } else { "--no-cone" }.to_string());
        args.extend(self.patterns.iter().cloned());
        args
    }
}

/// Derive a sparse plan from include patterns. Returns `None` when the
/// include list is empty, which disables sparse checkout entirely.
pub fn plan_sparse(include: &[String]) -> Result<Option<SparseSpec>, GitError> {
    let normalized = include
        .iter()
        .map(|pattern| pattern.replace('\\', "/"))
        .filter(|pattern| !pattern.is_empty())
        .collect::<Vec<_>>();
    if normalized.is_empty() {
        return Ok(None);
    }

    let mut expanded = Vec::new();
    for pattern in &normalized {
        expand_braces(pattern, &mut expanded);
        if expanded.len() > MAX_BRACE_EXPANSIONS {
            return Err(GitError::BraceExpansionExceeded {
                count: expanded.len(),
            });
        }
    }

    // Cone mode only fits plain directory prefixes; a single glob (and `**`
    // in particular) forces pattern mode.
    if expanded.iter().all(|pattern| is_directory_literal(pattern)) {
        let mut dirs = expanded
            .iter()
            .map(|pattern| pattern.trim_end_matches('/').to_string())
            .collect::<Vec<_>>();
        dirs.sort();
        dirs.dedup();
        return Ok(Some(SparseSpec {
            cone: true,
            patterns: dirs,
        }));
    }

    Ok(Some(SparseSpec {
        cone: false,
        patterns: expanded,
    }))
}

fn is_directory_literal(pattern: &str) -> bool {
    !has_glob_meta(pattern) && pattern.ends_with('/')
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']', '{', '}'])
}

/// Expand one level of `{a,b,c}` alternation, recursing for the remainder.
/// Patterns without braces pass through untouched.
fn expand_braces(pattern: &str, out: &mut Vec<String>) {
    let Some(open) = pattern.find('{') else {
        out.push(pattern.to_string());
        return;
    };

    // Find the matching close, honoring nesting.
    let mut depth = 0usize;
    let mut close = None;
    let mut commas = Vec::new();
    for (offset, ch) in pattern[open..].char_indices() {
        let index = open + offset;
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(index);
                    break;
                }
            }
            ',' if depth == 1 => commas.push(index),
            _ => {}
        }
    }
    let Some(close) = close else {
        // Unbalanced braces are kept literal.
        out.push(pattern.to_string());
        return;
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut start = open + 1;
    for end in commas.iter().copied().chain([close]) {
        let alternative = &pattern[start..end];
        expand_braces(&format!("{prefix}{alternative}{suffix}"), out);
        start = end + 1;
    }
}

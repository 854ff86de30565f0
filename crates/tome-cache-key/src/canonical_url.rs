use std::fmt::{Display, Formatter};

use url::Url;

/// A "canonical" rendition of a repository locator, used for internal
/// comparison and store keying only.
///
/// Canonicalization papers over spelling differences such as
/// `github.com/foo/bar` vs. `github.com/foo/bar.git`, so that both end up
/// sharing a single bare-repo store. All fetching still happens with the
/// original string the user wrote.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct RepositoryUrl(String);

impl RepositoryUrl {
    /// Canonicalize a repository locator.
    ///
    /// Accepts anything the sync engine accepts: `https://` and `ssh://`
    /// URLs, plus scp-like `git@host:path` shorthands. Inputs that fit
    /// neither shape are kept verbatim; they will be rejected later, when
    /// the ref resolver parses the host.
    pub fn parse(repo: &str) -> Self {
        let repo = repo.trim();

        if let Ok(url) = Url::parse(repo) {
            if url.has_host() {
                return Self(canonicalize_url(url));
            }
        }

        // Ex) `git@github.com:foo/bar.git`
        if let Some((user_host, path)) = repo.split_once(':') {
            if user_host.contains('@') && !user_host.contains('/') {
                let path = strip_git_suffix(path.trim_end_matches('/'));
                return Self(format!("{}:{path}", user_host.to_lowercase()));
            }
        }

        Self(repo.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn canonicalize_url(mut url: Url) -> String {
    // Strip a trailing slash.
    if url.path().ends_with('/') {
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
        }
    }

    // GitHub treats URL paths case-insensitively, but they hash differently,
    // and we're gonna be hashing them.
    if url.host_str() == Some("github.com") {
        let path = url.path().to_lowercase();
        url.set_path(&path);
    }

    // Repos can generally be accessed with or without the `.git` extension.
    let path = strip_git_suffix(url.path()).to_string();
    url.set_path(&path);

    url.to_string()
}

fn strip_git_suffix(path: &str) -> &str {
    path.strip_suffix(".git").unwrap_or(path)
}

impl Display for RepositoryUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_suffix_is_ignored() {
        assert_eq!(
            RepositoryUrl::parse("https://github.com/foo/bar.git"),
            RepositoryUrl::parse("https://github.com/foo/bar"),
        );
        assert_eq!(
            RepositoryUrl::parse("git@github.com:foo/bar.git"),
            RepositoryUrl::parse("git@github.com:foo/bar"),
        );
    }

    #[test]
    fn github_paths_are_case_insensitive() {
        assert_eq!(
            RepositoryUrl::parse("https://github.com/Foo/Bar"),
            RepositoryUrl::parse("https://github.com/foo/bar"),
        );
        // Other hosts keep their case.
        assert_ne!(
            RepositoryUrl::parse("https://gitlab.com/Foo/Bar"),
            RepositoryUrl::parse("https://gitlab.com/foo/bar"),
        );
    }

    #[test]
    fn different_repositories_stay_distinct() {
        assert_ne!(
            RepositoryUrl::parse("https://github.com/foo/bar"),
            RepositoryUrl::parse("https://github.com/foo/baz"),
        );
    }

    #[test]
    fn trailing_slash_is_ignored() {
        assert_eq!(
            RepositoryUrl::parse("https://gitlab.com/foo/bar/"),
            RepositoryUrl::parse("https://gitlab.com/foo/bar"),
        );
    }
}

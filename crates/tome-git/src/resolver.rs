use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::git::{redact, GitCommand};
use crate::GitError;

/// A remote ref pinned to a concrete commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    pub repo: String,
    pub git_ref: String,
    pub resolved_commit: String,
}

/// Extract the host from a repository locator.
///
/// Supports `https://` and `ssh://` URLs plus the scp-like `git@host:path`
/// shorthand. Anything else is an unsupported locator.
pub fn repo_host(repo: &str) -> Result<String, GitError> {
    if repo.contains("://") {
        let url = Url::parse(repo).map_err(|_| GitError::UnsupportedRepoUrl {
            repo: redact(repo),
        })?;
        if !matches!(url.scheme(), "https" | "ssh") {
            return Err(GitError::UnsupportedRepoUrl {
                repo: redact(repo),
            });
        }
        return url
            .host_str()
            .map(str::to_owned)
            .ok_or_else(|| GitError::UnsupportedRepoUrl {
                repo: redact(repo),
            });
    }

    // Ex) `git@github.com:rust-lang/cargo.git`
    if let Some((user_host, path)) = repo.split_once(':') {
        if let Some((_, host)) = user_host.split_once('@') {
            if !host.is_empty() && !host.contains('/') && !path.is_empty() {
                return Ok(host.to_string());
            }
        }
    }

    Err(GitError::UnsupportedRepoUrl {
        repo: redact(repo),
    })
}

/// Resolve `git_ref` in `repo` to a commit SHA via `git ls-remote`, after
/// checking the host against the allowlist.
pub async fn resolve_remote_commit(
    repo: &str,
    git_ref: &str,
    allow_hosts: &[String],
    timeout: Duration,
) -> Result<ResolvedRef, GitError> {
    let host = repo_host(repo)?;
    if !allow_hosts
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&host))
    {
        return Err(GitError::HostNotAllowed {
            host,
            repo: redact(repo),
            allowed: allow_hosts.join(", "),
        });
    }

    let output = GitCommand::new()
        .args(["ls-remote", repo, git_ref])
        .timeout(timeout)
        .run()
        .await?;

    let commit = output
        .stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.split_whitespace().next())
        .map(str::to_owned);

    match commit {
        Some(commit) => {
            debug!("resolved {}@{git_ref} to {commit}", redact(repo));
            Ok(ResolvedRef {
                repo: repo.to_string(),
                git_ref: git_ref.to_string(),
                resolved_commit: commit,
            })
        }
        None => Err(GitError::RefUnresolved {
            repo: redact(repo),
            git_ref: git_ref.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_https_and_ssh_hosts() {
        assert_eq!(repo_host("https://github.com/a/b.git").unwrap(), "github.com");
        assert_eq!(repo_host("ssh://git@gitlab.com/a/b").unwrap(), "gitlab.com");
    }

    #[test]
    fn parses_scp_like_hosts() {
        assert_eq!(repo_host("git@github.com:a/b.git").unwrap(), "github.com");
        assert_eq!(repo_host("deploy@git.corp.example:team/docs").unwrap(), "git.corp.example");
    }

    #[test]
    fn rejects_other_locators() {
        for repo in [
            "ftp://example.com/a/b",
            "file:///tmp/repo",
            "/local/path",
            "github.com/a/b",
            "git@:path",
        ] {
            assert!(
                matches!(repo_host(repo), Err(GitError::UnsupportedRepoUrl { .. })),
                "{repo} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn disallowed_host_fails_before_any_network() {
        let err = resolve_remote_commit(
            "https://evil.example/a/b",
            "HEAD",
            &["github.com".to_string()],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GitError::HostNotAllowed { .. }));
    }

    #[tokio::test]
    async fn allowlist_is_case_insensitive() {
        // Resolution proceeds past the host check and fails later (no such
        // host on the network), never with `HostNotAllowed`.
        let err = resolve_remote_commit(
            "https://GitHub.com/definitely/missing-repo-xyz",
            "HEAD",
            &["github.com".to_string()],
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(!matches!(err, GitError::HostNotAllowed { .. }));
    }
}

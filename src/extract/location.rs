//! Resolving where the repository lives

use super::error::ExtractError;
use crate::process::run_captured;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;

const REMOTE_PREFIXES: &[&str] = &["http://", "https://", "git@", "ssh://"];

/// A repository reference given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocation {
    Local(PathBuf),
    Remote(String),
}

impl RepoLocation {
    /// Classify `raw` as a remote URL or a local path
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if REMOTE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            Self::Remote(trimmed.to_string())
        } else {
            Self::Local(PathBuf::from(trimmed))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Make the repository available on disk, cloning remotes into a
    /// temporary directory
    pub async fn checkout(&self) -> Result<Checkout, ExtractError> {
        match self {
            Self::Local(path) => Ok(Checkout {
                path: path.clone(),
                clone: None,
            }),
            Self::Remote(url) => clone_remote(url).await,
        }
    }
}

impl std::fmt::Display for RepoLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// A repository on local disk. A cloned one is deleted when this drops.
#[derive(Debug)]
pub struct Checkout {
    path: PathBuf,
    clone: Option<TempDir>,
}

impl Checkout {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this checkout is a disposable clone
    pub fn is_disposable(&self) -> bool {
        self.clone.is_some()
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        if self.clone.is_some() {
            tracing::info!(path = %self.path.display(), "Removing temporary clone");
        }
    }
}

async fn clone_remote(url: &str) -> Result<Checkout, ExtractError> {
    let dir = tempfile::Builder::new().prefix("skillmine-clone-").tempdir()?;
    let target = dir.path().join("repo");

    tracing::info!(url, target = %target.display(), "Cloning remote repository");

    let output = run_captured(
        Command::new("git")
            .args(["clone", "--quiet", url])
            .arg(&target)
            .env("GIT_TERMINAL_PROMPT", "0"),
    )
    .await
    .map_err(ExtractError::from_git)?;

    if !output.success() {
        return Err(ExtractError::CloneFailed {
            url: url.to_string(),
            message: output.stderr.trim().to_string(),
        });
    }

    Ok(Checkout {
        path: target,
        clone: Some(dir),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::source::tests::{fixture_repo, git_available};

    #[test]
    fn test_parse_remote_references() {
        for url in [
            "https://github.com/org/repo.git",
            "http://git.local/repo",
            "git@github.com:org/repo.git",
            "ssh://git@host/repo",
        ] {
            assert_eq!(RepoLocation::parse(url), RepoLocation::Remote(url.to_string()));
        }
    }

    #[test]
    fn test_parse_local_paths() {
        assert_eq!(
            RepoLocation::parse("temp_netlex_repo"),
            RepoLocation::Local(PathBuf::from("temp_netlex_repo"))
        );
        assert_eq!(
            RepoLocation::parse(" /srv/git/app "),
            RepoLocation::Local(PathBuf::from("/srv/git/app"))
        );
        assert!(!RepoLocation::parse("./github.com/repo").is_remote());
    }

    #[tokio::test]
    async fn test_local_checkout_is_not_disposable() {
        let checkout = RepoLocation::parse("some/path").checkout().await.unwrap();
        assert_eq!(checkout.path(), Path::new("some/path"));
        assert!(!checkout.is_disposable());
    }

    #[tokio::test]
    async fn test_clone_is_removed_on_drop() {
        if !git_available().await {
            return;
        }
        let origin = fixture_repo().await;
        // A file:// URL is not classified as remote, so build the location directly
        let location = RepoLocation::Remote(format!("file://{}", origin.path().display()));

        let checkout = location.checkout().await.unwrap();
        let cloned = checkout.path().to_path_buf();
        assert!(checkout.is_disposable());
        assert!(cloned.join("login.rs").exists());

        drop(checkout);
        assert!(!cloned.exists());
    }

    #[tokio::test]
    async fn test_clone_failure() {
        if !git_available().await {
            return;
        }
        let missing = TempDir::new().unwrap();
        let location =
            RepoLocation::Remote(format!("file://{}/nope", missing.path().display()));

        let err = location.checkout().await.unwrap_err();
        assert!(matches!(err, ExtractError::CloneFailed { .. }));
    }
}

//! Error types for commit extraction

use crate::process::OutputWaitError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that end the ingestion phase
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("git is not available on this system")]
    GitNotAvailable,

    #[error("path is not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("failed to clone {url}: {message}")]
    CloneFailed { url: String, message: String },

    #[error("commit traversal failed: {0}")]
    TraversalFailed(String),

    #[error("malformed git log record: {0}")]
    MalformedRecord(String),

    #[error("git command failed: {0}")]
    Command(#[from] OutputWaitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Map a command failure, recognising a missing git binary
    pub(crate) fn from_git(err: OutputWaitError) -> Self {
        if err.is_not_found() {
            Self::GitNotAvailable
        } else {
            Self::Command(err)
        }
    }
}

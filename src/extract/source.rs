//! Pull-based commit sources

use super::error::ExtractError;
use super::parser::{LOG_FORMAT, RECORD_SEPARATOR, parse_record, starts_record};
use crate::process::{drain_lossy, exit_status_code, run_captured};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// One commit as produced by a traversal, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommit {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    /// Committer time, seconds since the epoch
    pub timestamp: i64,
    pub message: String,
    pub files: Vec<String>,
}

/// A finite, non-restartable sequence of commits, newest first
#[async_trait]
pub trait CommitSource: Send {
    /// Next commit, or `None` once the history is exhausted
    async fn next_commit(&mut self) -> Result<Option<RawCommit>, ExtractError>;

    /// Short description for log lines
    fn describe(&self) -> String;
}

/// In-memory source, used to seed stores and in tests
pub struct VecSource {
    commits: std::vec::IntoIter<RawCommit>,
    failure: Option<ExtractError>,
}

impl VecSource {
    pub fn new(commits: Vec<RawCommit>) -> Self {
        Self {
            commits: commits.into_iter(),
            failure: None,
        }
    }

    /// Fail with `error` once the commits run out
    pub fn then_fail(mut self, error: ExtractError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait]
impl CommitSource for VecSource {
    async fn next_commit(&mut self) -> Result<Option<RawCommit>, ExtractError> {
        if let Some(commit) = self.commits.next() {
            return Ok(Some(commit));
        }
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        "in-memory commits".to_string()
    }
}

/// Streams `git log` output for a local repository, one record at a time
pub struct GitLogSource {
    repo: PathBuf,
    stream: Option<LogStream>,
}

struct LogStream {
    child: Child,
    reader: BufReader<ChildStdout>,
    stderr: JoinHandle<std::io::Result<String>>,
    buf: Vec<u8>,
    /// Record being assembled until the next real record start
    pending: Option<Vec<u8>>,
}

impl GitLogSource {
    /// Verify git and the repository, then start the traversal
    pub async fn open(repo: &Path) -> Result<Self, ExtractError> {
        if !repo.is_dir() {
            return Err(ExtractError::NotARepository(repo.to_path_buf()));
        }

        let version = run_captured(Command::new("git").arg("--version"))
            .await
            .map_err(ExtractError::from_git)?;
        if !version.success() {
            return Err(ExtractError::GitNotAvailable);
        }

        let git_dir = run_captured(git_in(repo).args(["rev-parse", "--git-dir"]))
            .await
            .map_err(ExtractError::from_git)?;
        if !git_dir.success() {
            return Err(ExtractError::NotARepository(repo.to_path_buf()));
        }

        // git log fails outright on a repository with no commits yet
        let head = run_captured(git_in(repo).args(["rev-parse", "--verify", "--quiet", "HEAD"]))
            .await
            .map_err(ExtractError::from_git)?;
        if !head.success() {
            tracing::info!(repo = %repo.display(), "Repository has no commits");
            return Ok(Self {
                repo: repo.to_path_buf(),
                stream: None,
            });
        }

        let mut child = git_in(repo)
            .args(["-c", "core.quotepath=off", "log", "--name-only", LOG_FORMAT])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExtractError::GitNotAvailable
                } else {
                    ExtractError::Io(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractError::TraversalFailed("git log stdout not captured".into()))?;
        let stderr = tokio::spawn(drain_lossy(child.stderr.take()));

        tracing::debug!(repo = %repo.display(), "Started git log");

        Ok(Self {
            repo: repo.to_path_buf(),
            stream: Some(LogStream {
                child,
                reader: BufReader::new(stdout),
                stderr,
                buf: Vec::new(),
                pending: None,
            }),
        })
    }
}

impl LogStream {
    /// Read the next raw record, without its separator
    async fn next_record(&mut self) -> Result<Option<Vec<u8>>, ExtractError> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(RECORD_SEPARATOR, &mut self.buf)
                .await?;
            if read == 0 {
                return Ok(self.pending.take());
            }
            if self.buf.last() == Some(&RECORD_SEPARATOR) {
                self.buf.pop();
            }

            if self.pending.is_none() {
                if !self.buf.iter().all(u8::is_ascii_whitespace) {
                    self.pending = Some(std::mem::take(&mut self.buf));
                }
                continue;
            }

            if starts_record(&self.buf) {
                let next = std::mem::take(&mut self.buf);
                return Ok(self.pending.replace(next));
            }

            // Separator byte inside a commit message
            if let Some(pending) = self.pending.as_mut() {
                pending.push(RECORD_SEPARATOR);
                pending.extend_from_slice(&self.buf);
            }
        }
    }

    /// Reap the process once stdout hits EOF
    async fn finish(&mut self) -> Result<(), ExtractError> {
        let status = self.child.wait().await?;
        let stderr = (&mut self.stderr)
            .await
            .map_err(|e| ExtractError::TraversalFailed(e.to_string()))??;

        if status.success() {
            return Ok(());
        }
        let code = exit_status_code(&status)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".into());
        Err(ExtractError::TraversalFailed(format!(
            "git log exited with {}: {}",
            code,
            stderr.trim()
        )))
    }
}

#[async_trait]
impl CommitSource for GitLogSource {
    async fn next_commit(&mut self) -> Result<Option<RawCommit>, ExtractError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        while let Some(record) = stream.next_record().await? {
            if let Some(commit) = parse_record(&record)? {
                return Ok(Some(commit));
            }
        }

        let result = stream.finish().await;
        self.stream = None;
        result.map(|_| None)
    }

    fn describe(&self) -> String {
        self.repo.display().to_string()
    }
}

fn git_in(repo: &Path) -> Command {
    let mut command = Command::new("git");
    command.current_dir(repo);
    command
}

//! Child process helpers for the git commands

use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

fn exit_status_code_parts(code: Option<i32>, _signal: Option<i32>) -> Option<i32> {
    if let Some(code) = code {
        return Some(code);
    }
    #[cfg(unix)]
    {
        if let Some(signal) = _signal {
            return Some(128 + signal);
        }
    }
    None
}

/// Exit code of a finished process, 128+signal for signal-terminated ones on Unix.
pub(crate) fn exit_status_code(status: &std::process::ExitStatus) -> Option<i32> {
    let code = status.code();
    #[cfg(unix)]
    let signal = status.signal();
    #[cfg(not(unix))]
    let signal = None;
    exit_status_code_parts(code, signal)
}

/// Which pipe a read failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputStream {
    Stdout,
    Stderr,
}

/// Failure to run a command to completion
#[derive(Debug, Error)]
pub(crate) enum OutputWaitError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed reading {stream:?}: {source}")]
    Read {
        stream: OutputStream,
        source: std::io::Error,
    },

    #[error("failed waiting for process: {source}")]
    Wait { source: std::io::Error },
}

impl OutputWaitError {
    /// Whether the program itself could not be found
    pub(crate) fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub(crate) struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl CommandOutput {
    pub(crate) fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Read a pipe to the end, replacing invalid UTF-8
pub(crate) async fn drain_lossy<R>(pipe: Option<R>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Wait for child output, reading stdout/stderr concurrently to avoid deadlock.
pub(crate) async fn wait_for_child_output(
    child: &mut Child,
) -> Result<CommandOutput, OutputWaitError> {
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let stdout_fut = async move {
        drain_lossy(stdout_pipe)
            .await
            .map_err(|e| (OutputStream::Stdout, e))
    };
    let stderr_fut = async move {
        drain_lossy(stderr_pipe)
            .await
            .map_err(|e| (OutputStream::Stderr, e))
    };

    let (stdout, stderr) = match tokio::try_join!(stdout_fut, stderr_fut) {
        Ok(result) => result,
        Err((stream, source)) => {
            let _ = child.kill().await;
            return Err(OutputWaitError::Read { stream, source });
        }
    };

    let status = child
        .wait()
        .await
        .map_err(|source| OutputWaitError::Wait { source })?;

    Ok(CommandOutput {
        stdout,
        stderr,
        code: exit_status_code(&status),
    })
}

/// Spawn `command` with piped output and wait for it to finish
pub(crate) async fn run_captured(command: &mut Command) -> Result<CommandOutput, OutputWaitError> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| OutputWaitError::Spawn { program, source })?;

    wait_for_child_output(&mut child).await
}

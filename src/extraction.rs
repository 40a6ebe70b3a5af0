//! Text extraction through an external tool.
//!
//! The tool is an opaque program invoked as `<tool> <file>`. It writes the document text to stdout
//! and exits with status 0. Anything it prints to stderr is kept as diagnostics for the logs. The
//! production [`CommandExtractor`] drains both pipes while waiting on the child, enforces a time
//! budget, and never returns before the child has been reaped.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Exit status reported when the tool was terminated by a signal.
pub const SIGNALLED_EXIT_STATUS: i32 = -1;

/// Errors surfaced while running the extraction tool.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Tool could not be launched at all.
    #[error("Failed to launch extraction tool '{program}': {source}")]
    Spawn {
        /// Program that was executed.
        program: String,
        /// Underlying launch error.
        #[source]
        source: std::io::Error,
    },
    /// Reading the tool's output or waiting on it failed.
    #[error("Extraction tool I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Tool exited with a non-zero status.
    #[error("Extraction tool exited with status {exit_status}")]
    Failed {
        /// Exit status reported by the tool.
        exit_status: i32,
        /// Everything the tool wrote to stderr.
        diagnostics: String,
    },
    /// Tool did not finish within its time budget and was killed.
    #[error("Extraction tool did not finish within {seconds}s")]
    Timeout {
        /// Budget that elapsed.
        seconds: u64,
    },
}

/// Output of a successful extractor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Document text captured from stdout.
    pub text: String,
    /// Informational stderr output; may be non-empty on success.
    pub diagnostics: String,
    /// Exit status reported by the tool.
    pub exit_status: i32,
}

/// Interface implemented by text extraction backends.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from the file at `path`, resolving only once the backend has fully finished.
    async fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractionError>;
}

/// Runs an external program and captures its output.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    leading_args: Vec<String>,
    timeout: Duration,
}

impl CommandExtractor {
    /// Build an extractor from a program, arguments placed before the file path, and a time budget.
    pub fn new(program: impl Into<PathBuf>, leading_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            leading_args,
            timeout,
        }
    }

    /// Build an extractor from a split command line such as `["python", "extract.py"]`.
    ///
    /// Returns `None` for an empty command.
    pub fn from_command_line(parts: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = parts.split_first()?;
        Some(Self::new(program, args.to_vec(), timeout))
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
impl TextExtractor for CommandExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractionError> {
        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractionError::Spawn {
                program: self.program_name(),
                source,
            })?;
        tracing::debug!(
            program = %self.program.display(),
            path = %path.display(),
            pid = ?child.id(),
            "Spawned extraction tool"
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr, status) =
            collect(&mut child, self.timeout, drain(stdout), drain(stderr)).await?;

        let exit_status = exit_code(status);
        let diagnostics = String::from_utf8_lossy(&stderr).into_owned();
        if exit_status != 0 {
            return Err(ExtractionError::Failed {
                exit_status,
                diagnostics,
            });
        }

        Ok(ExtractionResult {
            text: String::from_utf8_lossy(&stdout).into_owned(),
            diagnostics,
            exit_status,
        })
    }
}

/// Wait for the child while both pipe readers run, killing and reaping it if anything goes wrong.
async fn collect<O, E>(
    child: &mut Child,
    budget: Duration,
    stdout: O,
    stderr: E,
) -> Result<(Vec<u8>, Vec<u8>, ExitStatus), ExtractionError>
where
    O: Future<Output = std::io::Result<Vec<u8>>>,
    E: Future<Output = std::io::Result<Vec<u8>>>,
{
    let finished =
        tokio::time::timeout(budget, async { tokio::try_join!(stdout, stderr, child.wait()) })
            .await;

    match finished {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(error)) => {
            terminate(child).await;
            Err(ExtractionError::Io(error))
        }
        Err(_) => {
            terminate(child).await;
            Err(ExtractionError::Timeout {
                seconds: budget.as_secs(),
            })
        }
    }
}

async fn terminate(child: &mut Child) {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }
    if let Err(error) = child.kill().await {
        tracing::warn!(error = %error, pid = ?child.id(), "Failed to kill extraction tool");
    }
}

async fn drain<R>(reader: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buffer).await?;
    }
    Ok(buffer)
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNALLED_EXIT_STATUS)
}

//! Tracing configuration and log routing.
//!
//! Logs always go to stdout through a compact formatter. A second, non-blocking file layer is
//! added when its target can be opened. Extractor diagnostics and upstream API errors only ever
//! surface here.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_VAR: &str = "DOCSUM_LOG_FILE";
const LOG_DIR: &str = "logs";
const LOG_FILE_NAME: &str = "docsum.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// File the log layer appends to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    /// Path taken from `DOCSUM_LOG_FILE`.
    Explicit(PathBuf),
    /// `logs/docsum.log` relative to the working directory.
    Default,
}

impl LogTarget {
    /// Blank values count as unset, the same way configuration variables do.
    fn resolve(value: Option<String>) -> Self {
        match value.map(|raw| raw.trim().to_string()) {
            Some(path) if !path.is_empty() => Self::Explicit(PathBuf::from(path)),
            _ => Self::Default,
        }
    }

    /// Directory and file name handed to the appender, or `None` when the path names no file.
    fn location(&self) -> Option<(PathBuf, String)> {
        match self {
            Self::Explicit(path) => {
                let name = path.file_name()?.to_string_lossy().into_owned();
                let dir = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                Some((dir, name))
            }
            Self::Default => Some((PathBuf::from(LOG_DIR), LOG_FILE_NAME.to_string())),
        }
    }
}

/// Configure tracing subscribers for stdout and optional file logging.
///
/// `RUST_LOG` controls filtering and defaults to `info`. The file layer writes to
/// `DOCSUM_LOG_FILE` when set, otherwise to `logs/docsum.log`, without ANSI colors.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let target = LogTarget::resolve(std::env::var(LOG_FILE_VAR).ok());
    match open_log_writer(&target) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

// Runs before the subscriber exists, so failures go to stderr.
fn open_log_writer(target: &LogTarget) -> Option<NonBlocking> {
    let Some((dir, name)) = target.location() else {
        eprintln!("{LOG_FILE_VAR} does not name a file; file logging disabled");
        return None;
    };
    let appender = match build_appender(&dir, &name) {
        Ok(appender) => appender,
        Err(err) => {
            eprintln!("File logging disabled: {err}");
            return None;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}

fn build_appender(dir: &Path, name: &str) -> Result<RollingFileAppender, String> {
    std::fs::create_dir_all(dir)
        .map_err(|err| format!("cannot create {}: {err}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
        .map_err(|err| format!("cannot open {}: {err}", dir.join(name).display()))
}

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_EXTRACTOR_COMMAND: &str = "python process_document.py";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SUMMARIZATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docsum server.
///
/// Built once at startup and handed to the components that need it; nothing reads the
/// environment after [`Config::from_env`] returns.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on.
    pub server_port: u16,
    /// Directory holding uploads while they are being processed.
    pub upload_dir: PathBuf,
    /// Extraction tool followed by any leading arguments; the upload path is appended last.
    pub extractor_command: Vec<String>,
    /// Upper bound on a single extraction run.
    pub extraction_timeout: Duration,
    /// API key for the Gemini `generateContent` endpoint.
    pub gemini_api_key: String,
    /// Model identifier used for every summary.
    pub gemini_model: String,
    /// Base URL of the Gemini REST API.
    pub gemini_base_url: String,
    /// Upper bound on a single summarization request.
    pub summarization_timeout: Duration,
    /// Additional attempts allowed for transient summarization failures.
    pub summarization_max_retries: u32,
    /// Largest request body accepted by the upload endpoint.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let extractor_command = load_env_optional("EXTRACTOR_COMMAND")
            .unwrap_or_else(|| DEFAULT_EXTRACTOR_COMMAND.to_string());
        Ok(Self {
            server_port: parse_optional("PORT")?.unwrap_or(DEFAULT_PORT),
            upload_dir: load_env_optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            extractor_command: split_command("EXTRACTOR_COMMAND", &extractor_command)?,
            extraction_timeout: parse_timeout(
                "EXTRACTION_TIMEOUT_SECS",
                DEFAULT_EXTRACTION_TIMEOUT_SECS,
            )?,
            gemini_api_key: load_env("GEMINI_API_KEY")?,
            gemini_model: load_env_optional("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: load_env_optional("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            summarization_timeout: parse_timeout(
                "SUMMARIZATION_TIMEOUT_SECS",
                DEFAULT_SUMMARIZATION_TIMEOUT_SECS,
            )?,
            summarization_max_retries: parse_optional("SUMMARIZATION_MAX_RETRIES")?.unwrap_or(0),
            max_upload_bytes: parse_optional("MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_timeout(key: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    match parse_optional::<u64>(key)?.unwrap_or(default_secs) {
        0 => Err(ConfigError::InvalidValue(key.to_string())),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn split_command(key: &str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(parts)
}

/// Load `.env` (or the given file) into the process environment, returning whether one was found.
pub fn load_dotenv(path: Option<&std::path::Path>) -> bool {
    match path {
        Some(path) => dotenvy::from_path(path).is_ok(),
        None => dotenvy::dotenv().is_ok(),
    }
}

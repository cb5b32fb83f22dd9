use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama3-8b-8192";

/// Application configuration loaded from environment variables.
/// Fails at startup if the API key is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub groq_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    /// Stream completions token-by-token instead of waiting for the whole body.
    pub llm_streaming: bool,
    /// Transport attempts per LLM call (429 / 5xx / connection errors).
    pub llm_max_retries: u32,
    pub llm_timeout_secs: u64,
    /// Additional request/parse cycles when the reply holds no usable JSON.
    pub parse_max_retries: u32,
    pub parse_retry_delay_ms: u64,
    pub max_upload_bytes: usize,
    /// Directory for spooled uploads; the system temp dir when unset.
    pub upload_spool_dir: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            groq_api_key: require_env("GROQ_API_KEY")?,
            llm_base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string()),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            llm_streaming: parse_env("LLM_STREAMING", true)?,
            llm_max_retries: parse_env("LLM_MAX_RETRIES", 3)?,
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 120)?,
            parse_max_retries: parse_env("PARSE_MAX_RETRIES", 2)?,
            parse_retry_delay_ms: parse_env("PARSE_RETRY_DELAY_MS", 1000)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 25 * 1024 * 1024)?,
            upload_spool_dir: std::env::var("UPLOAD_SPOOL_DIR").ok().map(PathBuf::from),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn parse_retry_delay(&self) -> Duration {
        Duration::from_millis(self.parse_retry_delay_ms)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Defaults with a dummy key and no retry delay.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            groq_api_key: "test-key".to_string(),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_streaming: true,
            llm_max_retries: 3,
            llm_timeout_secs: 5,
            parse_max_retries: 2,
            parse_retry_delay_ms: 0,
            max_upload_bytes: 1024 * 1024,
            upload_spool_dir: None,
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} has an invalid value '{raw}'"))
}

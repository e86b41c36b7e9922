use anyhow::{Context, Result};

use crate::llm_client::DEFAULT_MAX_RETRIES;
use crate::pipeline::ingest::DEFAULT_MAX_UPLOAD_BYTES;
use crate::pipeline::notifications::DEFAULT_FOLLOW_UP_THRESHOLD;
use crate::pipeline::store::DEFAULT_SESSION_IDLE_TIMEOUT_SECS;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Retries after the first backend attempt.
    pub llm_max_retries: u32,
    /// Scores at or above this get a follow-up email, the rest a rejection.
    pub follow_up_threshold: u32,
    /// Request body limit for the upload route.
    pub max_upload_bytes: usize,
    /// Sessions untouched for this long are dropped by the sweeper.
    pub session_idle_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            llm_max_retries: parse_env("LLM_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            follow_up_threshold: parse_env("FOLLOW_UP_THRESHOLD", DEFAULT_FOLLOW_UP_THRESHOLD)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            session_idle_timeout_secs: parse_env(
                "SESSION_IDLE_TIMEOUT_SECS",
                DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
            )?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

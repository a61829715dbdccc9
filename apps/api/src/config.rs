use anyhow::{Context, Result};

use crate::models::document::DEFAULT_MAX_DOCUMENT_BYTES;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub engine_url: String,
    pub engine_timeout_secs: u64,
    pub max_document_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let max_document_bytes = document_limit(std::env::var("MAX_DOCUMENT_MB").ok())?;

        Ok(Config {
            engine_url: require_env("ANALYSIS_ENGINE_URL")?,
            engine_timeout_secs: std::env::var("ENGINE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse::<u64>()
                .context("ENGINE_TIMEOUT_SECS must be a number of seconds")?,
            max_document_bytes,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// `MAX_DOCUMENT_MB` in bytes, or the default when unset.
fn document_limit(megabytes: Option<String>) -> Result<usize> {
    let Some(mb) = megabytes else {
        return Ok(DEFAULT_MAX_DOCUMENT_BYTES);
    };
    mb.trim()
        .parse::<usize>()
        .context("MAX_DOCUMENT_MB must be a whole number of megabytes")?
        .checked_mul(1024 * 1024)
        .with_context(|| format!("MAX_DOCUMENT_MB={mb} is too large"))
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

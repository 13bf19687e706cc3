use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unset keeps analyses and profiles in memory for the life of the process.
    pub database_url: Option<String>,
    /// Unset runs the cache in-process, suitable for a single node.
    pub redis_url: Option<String>,
    pub inference_api_url: String,
    pub inference_api_key: String,
    pub ner_model: String,
    pub sentiment_model: String,
    pub upload_dir: PathBuf,
    pub job_concurrency: usize,
    pub job_max_attempts: u32,
    pub job_backoff_base_ms: u64,
    pub maintenance_max_attempts: u32,
    pub devto_api_url: String,
    pub hashnode_api_url: String,
    pub port: u16,
    pub rust_log: String,
}

/// Knobs for the job queue, split out so tests can build one without env vars.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of jobs executing at once.
    pub concurrency: usize,
    /// Total attempts for an analysis job, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further attempt.
    pub backoff_base: Duration,
    /// Total attempts for scheduled maintenance jobs.
    pub maintenance_max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_attempts: 3,
            backoff_base: Duration::from_millis(2000),
            maintenance_max_attempts: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            inference_api_url: require_env("INFERENCE_API_URL")?,
            inference_api_key: require_env("INFERENCE_API_KEY")?,
            ner_model: optional_env("NER_MODEL", "dslim/bert-base-NER"),
            sentiment_model: optional_env(
                "SENTIMENT_MODEL",
                "distilbert-base-uncased-finetuned-sst-2-english",
            ),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("insights-uploads")),
            job_concurrency: parse_env("JOB_CONCURRENCY", 5)?,
            job_max_attempts: parse_env("JOB_MAX_ATTEMPTS", 3)?,
            job_backoff_base_ms: parse_env("JOB_BACKOFF_BASE_MS", 2000)?,
            maintenance_max_attempts: parse_env("MAINTENANCE_MAX_ATTEMPTS", 2)?,
            devto_api_url: optional_env("DEVTO_API_URL", "https://dev.to/api"),
            hashnode_api_url: optional_env("HASHNODE_API_URL", "https://gql.hashnode.com"),
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            concurrency: self.job_concurrency.max(1),
            max_attempts: self.job_max_attempts.max(1),
            backoff_base: Duration::from_millis(self.job_backoff_base_ms),
            maintenance_max_attempts: self.maintenance_max_attempts.max(1),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracehub_pipeline::SummaryConfig;

/// Server configuration, environment-driven. Everything has a default except
/// the connection strings and the API secret.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub database_url: String,
    pub redis_url: String,
    pub api_key: String,

    /// S3 bucket for transcripts; when unset, blobs live on the local
    /// filesystem under `blob_dir`.
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub blob_dir: String,

    pub summary: SummaryConfig,

    pub pipeline_concurrency: usize,
    pub pipeline_max_depth: usize,

    /// Consumer poll block timeout in milliseconds.
    pub consumer_block_ms: u64,
    /// Deliveries before an event is dead-lettered.
    pub consumer_max_deliveries: u64,

    /// Sessions untouched this long with parsing outstanding are re-enqueued.
    pub stuck_threshold_ms: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bind = env_or("TRACEHUB_BIND", "127.0.0.1:4680")
            .parse()
            .context("TRACEHUB_BIND is not a valid socket address")?;

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let redis_url = std::env::var("REDIS_URL").context("REDIS_URL is required")?;
        let api_key = std::env::var("TRACEHUB_API_KEY").context("TRACEHUB_API_KEY is required")?;

        let summary = SummaryConfig {
            enabled: env_or("TRACEHUB_SUMMARY_ENABLED", "false") == "true",
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            model: env_or("TRACEHUB_SUMMARY_MODEL", "claude-3-5-haiku-latest"),
            ..SummaryConfig::default()
        };

        Ok(Self {
            bind,
            database_url,
            redis_url,
            api_key,
            s3_bucket: std::env::var("TRACEHUB_S3_BUCKET").ok(),
            s3_region: env_or("TRACEHUB_S3_REGION", "us-east-1"),
            s3_endpoint: std::env::var("TRACEHUB_S3_ENDPOINT").ok(),
            blob_dir: env_or("TRACEHUB_BLOB_DIR", "/var/lib/tracehub/blobs"),
            summary,
            pipeline_concurrency: env_parse("TRACEHUB_PIPELINE_CONCURRENCY", 3)?,
            pipeline_max_depth: env_parse("TRACEHUB_PIPELINE_MAX_DEPTH", 50)?,
            consumer_block_ms: env_parse("TRACEHUB_CONSUMER_BLOCK_MS", 5000)?,
            consumer_max_deliveries: env_parse("TRACEHUB_CONSUMER_MAX_DELIVERIES", 5)?,
            stuck_threshold_ms: env_parse("TRACEHUB_STUCK_THRESHOLD_MS", 300_000)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("{} is not valid", key)),
        Err(_) => Ok(default),
    }
}

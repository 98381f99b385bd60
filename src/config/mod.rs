//! Configuration module for sitekeeper.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite file backing the local KV store
    pub db_path: PathBuf,
    /// Base URL the published JSON documents are fetched from
    pub remote_base_url: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Lifetime of the forced-local flag set after a restore
    pub force_local_ttl: Duration,
    /// Quiet period before catalog edits are written back
    pub save_debounce: Duration,
    /// Number of KV writes per restore transaction
    pub restore_batch_size: usize,
    /// Upper bound on the serialized size of a restore
    pub max_payload_bytes: u64,
    /// Per-request timeout for remote fetches, `None` waits indefinitely
    pub fetch_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/site.sqlite"),
            remote_base_url: "http://127.0.0.1:8080".to_string(),
            log_level: "info".to_string(),
            force_local_ttl: Duration::from_secs(10),
            save_debounce: Duration::from_millis(1500),
            restore_batch_size: 10,
            max_payload_bytes: 512 * 1024 * 1024,
            fetch_timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let db_path = env::var("SITEKEEPER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let remote_base_url =
            env::var("SITEKEEPER_REMOTE_BASE_URL").unwrap_or(defaults.remote_base_url);

        let log_level = env::var("SITEKEEPER_LOG_LEVEL").unwrap_or(defaults.log_level);

        let force_local_ttl = Duration::from_secs(parse_env(
            "SITEKEEPER_FORCE_LOCAL_TTL_SECS",
            defaults.force_local_ttl.as_secs(),
        ));

        let save_debounce = Duration::from_millis(parse_env(
            "SITEKEEPER_SAVE_DEBOUNCE_MS",
            defaults.save_debounce.as_millis() as u64,
        ));

        let restore_batch_size =
            parse_env("SITEKEEPER_RESTORE_BATCH_SIZE", defaults.restore_batch_size).max(1);

        let max_payload_bytes = megabytes(parse_env::<u64>(
            "SITEKEEPER_MAX_PAYLOAD_MB",
            defaults.max_payload_bytes / MEBIBYTE,
        ));

        let fetch_timeout = match parse_env::<u64>("SITEKEEPER_FETCH_TIMEOUT_SECS", 0) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            db_path,
            remote_base_url,
            log_level,
            force_local_ttl,
            save_debounce,
            restore_batch_size,
            max_payload_bytes,
            fetch_timeout,
        }
    }
}

const MEBIBYTE: u64 = 1024 * 1024;

/// Byte count of `mb` mebibytes, capped at `u64::MAX`.
fn megabytes(mb: u64) -> u64 {
    mb.saturating_mul(MEBIBYTE)
}

fn parse_env<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {}={:?}, using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, when the required ones are present
//! 2. Otherwise a config file, probed from standard locations
//! 3. JSON and TOML are both accepted (by extension)
//!
//! ## Environment Variables
//! Required:
//! - `SHIFTSYNC_DB_PATH`: Database file path
//! - `SHIFTSYNC_API_BASE_URL`: Submission endpoint base URL
//!
//! Optional (defaults from [`Config::default`]):
//! - `SHIFTSYNC_DB_POOL_SIZE`, `SHIFTSYNC_DB_ENCRYPTION_KEY`
//! - `SHIFTSYNC_SYNC_INTERVAL`, `SHIFTSYNC_SYNC_ENABLED`,
//!   `SHIFTSYNC_RETENTION_DAYS`, `SHIFTSYNC_MAX_RETRY_DELAY`
//! - `SHIFTSYNC_API_TOKEN`, `SHIFTSYNC_API_TIMEOUT`, `SHIFTSYNC_API_HEALTH_PATH`
//! - `SHIFTSYNC_LOG_LEVEL`, `SHIFTSYNC_LOG_JSON`
//!
//! ## File Locations
//! `config.{json,toml}` and `shiftsync.{json,toml}` in the working directory,
//! its two parents, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use shiftsync_domain::{Config, Result, ShiftSyncError};

const FILE_NAMES: [&str; 4] = ["config.json", "config.toml", "shiftsync.json", "shiftsync.toml"];

/// Load configuration from the environment, falling back to a file
///
/// # Errors
/// Returns `ShiftSyncError::Config` when neither source yields a valid
/// configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `ShiftSyncError::Config` if a required variable is missing or any
/// numeric or boolean variable fails to parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("SHIFTSYNC_DB_PATH")?;
    config.submission.base_url = env_var("SHIFTSYNC_API_BASE_URL")?;

    if let Some(pool_size) = env_parse::<u32>("SHIFTSYNC_DB_POOL_SIZE", "pool size")? {
        config.database.pool_size = pool_size;
    }
    config.database.encryption_key = env_opt("SHIFTSYNC_DB_ENCRYPTION_KEY");

    config.sync.enabled =
        env_bool("SHIFTSYNC_SYNC_ENABLED", "sync enabled flag", config.sync.enabled)?;
    if let Some(interval) = env_parse::<u64>("SHIFTSYNC_SYNC_INTERVAL", "sync interval")? {
        config.sync.interval_seconds = interval;
    }
    if let Some(days) = env_parse::<u32>("SHIFTSYNC_RETENTION_DAYS", "retention days")? {
        config.sync.retention_days = days;
    }
    if let Some(delay) = env_parse::<u64>("SHIFTSYNC_MAX_RETRY_DELAY", "max retry delay")? {
        config.sync.max_retry_delay_seconds = delay;
    }

    config.submission.auth_token = env_opt("SHIFTSYNC_API_TOKEN");
    if let Some(timeout) = env_parse::<u64>("SHIFTSYNC_API_TIMEOUT", "API timeout")? {
        config.submission.timeout_seconds = timeout;
    }
    config.submission.health_path = env_opt("SHIFTSYNC_API_HEALTH_PATH");

    if let Some(level) = env_opt("SHIFTSYNC_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("SHIFTSYNC_LOG_JSON", "log json flag", config.logging.json)?;

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `ShiftSyncError::Config` if the file is missing, unreadable, or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ShiftSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ShiftSyncError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ShiftSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ShiftSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ShiftSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ShiftSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file in the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    candidates(&roots).into_iter().find(|path| path.exists())
}

fn candidates(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for root in roots {
        for dir in [root.clone(), root.join(".."), root.join("../..")] {
            paths.extend(FILE_NAMES.iter().map(|name| dir.join(name)));
        }
    }
    paths
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        ShiftSyncError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Unset and empty both read as absent
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str, label: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ShiftSyncError::Config(format!("Invalid {label}: {e}")))
        })
        .transpose()
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// Unset or empty yields `default`; anything else is a config error.
fn env_bool(key: &str, label: &str, default: bool) -> Result<bool> {
    let Some(raw) = env_opt(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ShiftSyncError::Config(format!(
            "Invalid {label}: expected a boolean, got '{other}'"
        ))),
    }
}

//! services/guard/src/config.rs
//!
//! Client settings: where the patrol API lives, how long to wait for it, how
//! often to poll it, and where device-local state is kept.
//!
//! Everything comes from `GUARD_*` environment variables (plus `RUST_LOG`),
//! optionally seeded from a `.env` file.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use tracing::Level;

/// Why the environment could not be turned into a `Config`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingVar(String),
    #[error("{0} has an invalid value: {1}")]
    InvalidValue(String, String),
}

/// Client settings, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: Url,
    /// Timeout for ordinary API calls.
    pub api_timeout: Duration,
    /// Timeout for health probes and scan submissions.
    pub probe_timeout: Duration,
    pub server_check_interval: Duration,
    pub link_check_interval: Duration,
    pub data_dir: PathBuf,
    pub app_name: String,
    pub log_level: Level,
}

impl Config {
    /// Reads the process environment, after merging a `.env` file from the
    /// working directory. Unit tests never read `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- API Settings ---
        let base_url_str =
            lookup("GUARD_API_BASE_URL").unwrap_or_else(|| "http://localhost:8000".to_string());
        let mut api_base_url = Url::parse(&base_url_str).map_err(|e| {
            ConfigError::InvalidValue("GUARD_API_BASE_URL".to_string(), e.to_string())
        })?;
        // Endpoint paths are joined onto the base, which needs a trailing slash.
        if !api_base_url.path().ends_with('/') {
            let path = format!("{}/", api_base_url.path());
            api_base_url.set_path(&path);
        }
        if api_base_url.host_str().is_none() {
            return Err(ConfigError::InvalidValue(
                "GUARD_API_BASE_URL".to_string(),
                format!("'{}' has no host", base_url_str),
            ));
        }

        let api_timeout = millis(&lookup, "GUARD_API_TIMEOUT_MS", 10_000)?;
        let probe_timeout = millis(&lookup, "GUARD_PROBE_TIMEOUT_MS", 3_000)?;
        let server_check_interval =
            Duration::from_secs(positive_int(&lookup, "GUARD_SERVER_CHECK_SECS", 30)?);
        let link_check_interval =
            Duration::from_secs(positive_int(&lookup, "GUARD_LINK_CHECK_SECS", 5)?);

        // --- Local Storage ---
        let data_dir = match lookup("GUARD_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|dir| dir.join("guard-patrol"))
                .ok_or_else(|| ConfigError::MissingVar("GUARD_DATA_DIR".to_string()))?,
        };

        let app_name = lookup("GUARD_APP_NAME").unwrap_or_else(|| "Janssen Guard".to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_base_url,
            api_timeout,
            probe_timeout,
            server_check_interval,
            link_check_interval,
            data_dir,
            app_name,
            log_level,
        })
    }

    /// `host:port` of the API, used for link checks.
    pub fn api_socket_addr(&self) -> Option<String> {
        let host = self.api_base_url.host_str()?;
        let port = self.api_base_url.port_or_known_default()?;
        Some(format!("{}:{}", host, port))
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    Ok(Duration::from_millis(positive_int(lookup, key, default)?))
}

/// Reads a positive integer variable.
fn positive_int(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("'{}' is not a positive integer", raw),
            )),
        },
    }
}

use crate::cache::indicator_cache::DEFAULT_FRESHNESS_WINDOW;
use crate::error::ConfigError;
use crate::fetch::remote::DEFAULT_BASE_URL;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 86_400;

pub const BASE_URL_VAR: &str = "WB_API_BASE_URL";
pub const CACHE_EXPIRY_DAYS_VAR: &str = "CACHE_EXPIRY_DAYS";
pub const STALE_CACHE_MAX_DAYS_VAR: &str = "STALE_CACHE_MAX_DAYS";
pub const REQUEST_TIMEOUT_SECS_VAR: &str = "REQUEST_TIMEOUT_SECS";
pub const DATA_DIR_VAR: &str = "ECOTRACK_DATA_DIR";

/// Runtime settings shared by the fetcher, the cache and the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of the indicator API, without trailing path segments.
    pub base_url: String,
    /// Cache files younger than this are served without a request.
    pub freshness_window: Duration,
    /// Oldest cache file still accepted when every request fails; `None` accepts any age.
    pub stale_limit: Option<Duration>,
    pub request_timeout: Duration,
    /// Holds `raw/` (the cache) and `processed/` (the output tables).
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            stale_limit: None,
            request_timeout: Duration::from_secs(20),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// Environment variables:
    /// - `WB_API_BASE_URL` (default: https://api.worldbank.org/v2)
    /// - `CACHE_EXPIRY_DAYS` (default: 7)
    /// - `STALE_CACHE_MAX_DAYS` (default: unset, any age is accepted)
    /// - `REQUEST_TIMEOUT_SECS` (default: 20)
    /// - `ECOTRACK_DATA_DIR` (default: data)
    ///
    /// Empty values count as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`.
    ///
    /// ```
    /// use ecotrack::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::from_lookup(|key| match key {
    ///     "CACHE_EXPIRY_DAYS" => Some("3".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(config.freshness_window, Duration::from_secs(3 * 86_400));
    /// assert_eq!(config.request_timeout, Duration::from_secs(20));
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let base_url = get(BASE_URL_VAR).unwrap_or(defaults.base_url);

        let freshness_window = match get(CACHE_EXPIRY_DAYS_VAR) {
            Some(raw) => days(CACHE_EXPIRY_DAYS_VAR, raw)?,
            None => defaults.freshness_window,
        };

        let stale_limit = get(STALE_CACHE_MAX_DAYS_VAR)
            .map(|raw| days(STALE_CACHE_MAX_DAYS_VAR, raw))
            .transpose()?;

        let request_timeout = match get(REQUEST_TIMEOUT_SECS_VAR) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: REQUEST_TIMEOUT_SECS_VAR,
                        value: raw,
                        expected: "a positive whole number of seconds",
                    })
                }
            },
            None => defaults.request_timeout,
        };

        let data_dir = get(DATA_DIR_VAR).map(PathBuf::from).unwrap_or(defaults.data_dir);

        Ok(Self {
            base_url,
            freshness_window,
            stale_limit,
            request_timeout,
            data_dir,
        })
    }

    /// `{data_dir}/raw`, the cache directory.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// `{data_dir}/processed`, where the cleaned tables are written.
    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }
}

fn days(key: &'static str, raw: String) -> Result<Duration, ConfigError> {
    raw.parse::<u64>()
        .ok()
        .and_then(|days| days.checked_mul(SECONDS_PER_DAY))
        .map(Duration::from_secs)
        .ok_or(ConfigError::InvalidValue {
            key,
            value: raw,
            expected: "a whole number of days",
        })
}

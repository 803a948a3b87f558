//! Application configuration loading from config.toml
//!
//! Every key is optional. A missing file is an error only when the path was
//! given explicitly; `load_default_config` falls back to built-in defaults so
//! the engine can start against an empty store.

use crate::{
    core::allowance::{AllowanceConfig, AllowanceSettings},
    errors::{Error, Result},
    sources::RetryPolicy,
};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CASHFLOW_CONFIG";
/// Config file used when `CASHFLOW_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const DEFAULT_CACHE_TTL_SECONDS: i64 = 60;

/// Raw shape of config.toml
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    database_url: Option<String>,
    cache_ttl_seconds: Option<i64>,
    working_capital: Option<f64>,
    units: Vec<String>,
    allowance: Option<AllowanceSettings>,
    retry: RetryPolicy,
}

/// Validated configuration of the engine
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Store URL from config.toml, before the `DATABASE_URL` override
    pub database_url: Option<String>,
    /// Lifetime of a cached collection
    pub cache_ttl: chrono::Duration,
    /// Working capital used until one is saved in the store
    pub working_capital: f64,
    /// Business units, in display order
    pub units: Vec<String>,
    /// Monthly allowance and its split
    pub allowance: AllowanceConfig,
    /// Retry policy applied to every source
    pub retry: RetryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            cache_ttl: crate::cache::DEFAULT_TTL,
            working_capital: 0.0,
            units: vec!["UN1".to_string(), "UN2".to_string()],
            allowance: AllowanceConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self> {
        let defaults = Self::default();

        let ttl_seconds = raw.cache_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECONDS);
        if ttl_seconds <= 0 {
            return Err(Error::config(format!(
                "cache_ttl_seconds must be positive, got {ttl_seconds}"
            )));
        }

        let working_capital = raw.working_capital.unwrap_or(defaults.working_capital);
        if !working_capital.is_finite() {
            return Err(Error::config("working_capital must be a finite number"));
        }

        let allowance = match raw.allowance {
            Some(settings) => AllowanceConfig::try_from(settings)?,
            None => defaults.allowance,
        };

        let units = if raw.units.is_empty() {
            allowance.units().map(str::to_string).collect()
        } else {
            raw.units
        };
        if let Some(unit) = allowance.units().find(|u| !units.iter().any(|known| known == u)) {
            return Err(Error::config(format!(
                "Allowance split names unit '{unit}' which is not in units"
            )));
        }

        Ok(Self {
            database_url: raw.database_url,
            cache_ttl: chrono::Duration::seconds(ttl_seconds),
            working_capital,
            units,
            allowance,
            retry: raw.retry,
        })
    }
}

/// Parses and validates configuration from TOML text.
pub fn parse_app_config(contents: &str) -> Result<AppConfig> {
    let raw: RawConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    AppConfig::try_from(raw)
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - The allowance split does not sum to 100 or names an unknown unit
pub fn load_app_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;
    parse_app_config(&contents)
}

/// Loads the file named by `CASHFLOW_CONFIG` (default `config.toml`).
///
/// A missing default file yields [`AppConfig::default`]; a file that exists
/// but is invalid is still an error.
pub fn load_default_config() -> Result<AppConfig> {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_app_config(path),
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_app_config(DEFAULT_CONFIG_PATH),
        Err(_) => {
            info!("No {DEFAULT_CONFIG_PATH} found, using built-in defaults");
            Ok(AppConfig::default())
        }
    }
}

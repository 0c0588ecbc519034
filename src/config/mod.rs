//! Configuration layer: typed settings with layered precedence (file → env).

use std::num::NonZeroU32;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const LOCAL_CONFIG_BASENAME: &str = "mercato";
const ENV_PREFIX: &str = "MERCATO";

const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 30;
const DEFAULT_WINDOW_DAYS: i64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_TIMEZONE: Tz = Tz::UTC;

/// Fully-resolved engine settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub aggregation: AggregationSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub expiration: Duration,
}

#[derive(Debug, Clone)]
pub struct AggregationSettings {
    /// Default trailing window for trend views.
    pub window_days: i64,
    /// Civil timezone for calendar-day bucketing.
    pub timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Transaction attempts before a conflict surfaces to the caller.
    pub retry_attempts: NonZeroU32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingSettings {
                level: LevelFilter::INFO,
                format: LogFormat::Compact,
            },
            cache: CacheSettings {
                enabled: true,
                expiration: Duration::from_secs(DEFAULT_CACHE_EXPIRATION_SECS),
            },
            aggregation: AggregationSettings {
                window_days: DEFAULT_WINDOW_DAYS,
                timezone: DEFAULT_TIMEZONE,
            },
            store: StoreSettings {
                retry_attempts: NonZeroU32::new(DEFAULT_RETRY_ATTEMPTS).unwrap_or(NonZeroU32::MIN),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings from the optional `mercato.toml` in the working directory
/// and the `MERCATO__*` environment.
pub fn load() -> Result<Settings, LoadError> {
    load_from(None)
}

/// Load settings, additionally requiring the file at `path` when given.
pub fn load_from(path: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder =
        Config::builder().add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    aggregation: RawAggregationSettings,
    store: RawStoreSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    expiration_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAggregationSettings {
    window_days: Option<i64>,
    timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    retry_attempts: Option<u32>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            aggregation,
            store,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            aggregation: build_aggregation_settings(aggregation)?,
            store: build_store_settings(store)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let seconds = cache
        .expiration_seconds
        .unwrap_or(DEFAULT_CACHE_EXPIRATION_SECS);
    if seconds == 0 {
        return Err(LoadError::invalid(
            "cache.expiration_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        expiration: Duration::from_secs(seconds),
    })
}

fn build_aggregation_settings(
    aggregation: RawAggregationSettings,
) -> Result<AggregationSettings, LoadError> {
    let window_days = aggregation.window_days.unwrap_or(DEFAULT_WINDOW_DAYS);
    if window_days <= 0 {
        return Err(LoadError::invalid(
            "aggregation.window_days",
            "must be a positive number of days",
        ));
    }

    let timezone = match aggregation.timezone {
        Some(name) => Tz::from_str(name.as_str())
            .map_err(|err| LoadError::invalid("aggregation.timezone", err.to_string()))?,
        None => DEFAULT_TIMEZONE,
    };

    Ok(AggregationSettings {
        window_days,
        timezone,
    })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let attempts = store.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS);
    let retry_attempts = NonZeroU32::new(attempts)
        .ok_or_else(|| LoadError::invalid("store.retry_attempts", "must be greater than zero"))?;

    Ok(StoreSettings { retry_attempts })
}

//! Configuration surface. Every key has an environment-variable
//! form; an optional TOML file layered on top is the only place unknown
//! keys are rejected outright — individual env vars can't be validated
//! against a closed set without risking false positives from unrelated
//! process environment noise.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration key: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("could not read configuration file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration file rejected: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub broker_host: String,
    pub broker_port: u16,
    pub broker_user: Option<String>,
    pub broker_password: Option<String>,
    pub broker_topic: String,
    pub broker_heartbeat_ms: u64,
    pub broker_backoff_max_ms: u64,

    pub store_path: PathBuf,
    pub store_retention_days: u32,

    pub cache_max_entries: usize,
    pub cache_max_age: Duration,

    pub server_listen: String,
    pub server_request_timeout_ms: u64,

    pub rate_limit_default_per_min: u32,
    pub rate_limit_health_per_min: u32,

    pub cors_origins: Vec<String>,

    pub health_check_timeout_ms: u64,
    pub health_cache_ttl_ms: u64,

    pub log_path: Option<PathBuf>,
    pub log_max_size_bytes: u64,
    pub log_max_files: u32,
}

/// Mirrors `Config` field-for-field but with every key optional, so a
/// TOML file can override a subset and `#[serde(deny_unknown_fields)]`
/// can reject anything it doesn't recognize.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
struct TomlOverrides {
    broker: Option<TomlBroker>,
    store: Option<TomlStore>,
    cache: Option<TomlCache>,
    server: Option<TomlServer>,
    rate_limit: Option<TomlRateLimit>,
    cors: Option<TomlCors>,
    health: Option<TomlHealth>,
    log: Option<TomlLog>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlBroker {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    topic: Option<String>,
    heartbeat_ms: Option<u64>,
    backoff_max_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlStore {
    path: Option<PathBuf>,
    retention_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlCache {
    max_entries: Option<usize>,
    max_age_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlServer {
    listen: Option<String>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRateLimit {
    default: Option<u32>,
    health: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlCors {
    origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlHealth {
    check_timeout_ms: Option<u64>,
    cache_ttl_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlLog {
    path: Option<PathBuf>,
    max_size_bytes: Option<u64>,
    max_files: Option<u32>,
}

impl Config {
    /// Builds the configuration from environment variables, then layers an
    /// optional TOML file named by `RAILWATCH_CONFIG_FILE` on top. Env vars
    /// supply every default; the file, when present, may only narrow them.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;

        if let Ok(path) = std::env::var("RAILWATCH_CONFIG_FILE") {
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::FileRead {
                path: path.clone(),
                source,
            })?;
            let overrides: TomlOverrides = toml::from_str(&contents)?;
            config.apply(overrides);
        }

        Ok(config)
    }

    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            broker_host: env_string("RAILWATCH_BROKER_HOST").unwrap_or_else(|| "localhost".to_string()),
            broker_port: env_parse("RAILWATCH_BROKER_PORT", 61613, "broker.port")?,
            broker_user: env_string("RAILWATCH_BROKER_USER"),
            broker_password: env_string("RAILWATCH_BROKER_PASSWORD"),
            broker_topic: env_string("RAILWATCH_BROKER_TOPIC")
                .ok_or(ConfigError::Missing("broker.topic"))?,
            broker_heartbeat_ms: env_parse("RAILWATCH_BROKER_HEARTBEAT_MS", 15_000, "broker.heartbeat_ms")?,
            broker_backoff_max_ms: env_parse(
                "RAILWATCH_BROKER_BACKOFF_MAX_MS",
                60_000,
                "broker.backoff_max_ms",
            )?,

            store_path: env_string("RAILWATCH_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("railwatch.sqlite")),
            store_retention_days: env_parse("RAILWATCH_STORE_RETENTION_DAYS", 90, "store.retention_days")?,

            cache_max_entries: env_parse("RAILWATCH_CACHE_MAX_ENTRIES", 500, "cache.max_entries")?,
            cache_max_age: Duration::from_secs(env_parse(
                "RAILWATCH_CACHE_MAX_AGE_SECS",
                24 * 3600,
                "cache.max_age",
            )?),

            server_listen: env_string("RAILWATCH_SERVER_LISTEN").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            server_request_timeout_ms: env_parse(
                "RAILWATCH_SERVER_REQUEST_TIMEOUT_MS",
                5_000,
                "server.request_timeout_ms",
            )?,

            rate_limit_default_per_min: env_parse("RAILWATCH_RATE_LIMIT_DEFAULT", 120, "rate_limit.default")?,
            rate_limit_health_per_min: env_parse("RAILWATCH_RATE_LIMIT_HEALTH", 60, "rate_limit.health")?,

            cors_origins: env_string("RAILWATCH_CORS_ORIGINS")
                .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| vec!["*".to_string()]),

            health_check_timeout_ms: env_parse(
                "RAILWATCH_HEALTH_CHECK_TIMEOUT_MS",
                2_000,
                "health.check_timeout_ms",
            )?,
            health_cache_ttl_ms: env_parse("RAILWATCH_HEALTH_CACHE_TTL_MS", 1_000, "health.cache_ttl_ms")?,

            log_path: env_string("RAILWATCH_LOG_PATH").map(PathBuf::from),
            log_max_size_bytes: env_parse("RAILWATCH_LOG_MAX_SIZE_BYTES", 10 * 1024 * 1024, "log.max_size_bytes")?,
            log_max_files: env_parse("RAILWATCH_LOG_MAX_FILES", 10, "log.max_files")?,
        })
    }

    fn apply(&mut self, overrides: TomlOverrides) {
        if let Some(broker) = overrides.broker {
            if let Some(v) = broker.host {
                self.broker_host = v;
            }
            if let Some(v) = broker.port {
                self.broker_port = v;
            }
            if broker.user.is_some() {
                self.broker_user = broker.user;
            }
            if broker.password.is_some() {
                self.broker_password = broker.password;
            }
            if let Some(v) = broker.topic {
                self.broker_topic = v;
            }
            if let Some(v) = broker.heartbeat_ms {
                self.broker_heartbeat_ms = v;
            }
            if let Some(v) = broker.backoff_max_ms {
                self.broker_backoff_max_ms = v;
            }
        }
        if let Some(store) = overrides.store {
            if let Some(v) = store.path {
                self.store_path = v;
            }
            if let Some(v) = store.retention_days {
                self.store_retention_days = v;
            }
        }
        if let Some(cache) = overrides.cache {
            if let Some(v) = cache.max_entries {
                self.cache_max_entries = v;
            }
            if let Some(v) = cache.max_age_secs {
                self.cache_max_age = Duration::from_secs(v);
            }
        }
        if let Some(server) = overrides.server {
            if let Some(v) = server.listen {
                self.server_listen = v;
            }
            if let Some(v) = server.request_timeout_ms {
                self.server_request_timeout_ms = v;
            }
        }
        if let Some(rate_limit) = overrides.rate_limit {
            if let Some(v) = rate_limit.default {
                self.rate_limit_default_per_min = v;
            }
            if let Some(v) = rate_limit.health {
                self.rate_limit_health_per_min = v;
            }
        }
        if let Some(cors) = overrides.cors {
            if let Some(v) = cors.origins {
                self.cors_origins = v;
            }
        }
        if let Some(health) = overrides.health {
            if let Some(v) = health.check_timeout_ms {
                self.health_check_timeout_ms = v;
            }
            if let Some(v) = health.cache_ttl_ms {
                self.health_cache_ttl_ms = v;
            }
        }
        if let Some(log) = overrides.log {
            if log.path.is_some() {
                self.log_path = log.path;
            }
            if let Some(v) = log.max_size_bytes {
                self.log_max_size_bytes = v;
            }
            if let Some(v) = log.max_files {
                self.log_max_files = v;
            }
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T, field: &'static str) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key: field, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_reject_unknown_keys() {
        let raw = "broker = { host = \"darwin.example\", bogus = 1 }";
        let result: Result<TomlOverrides, _> = toml::from_str(raw);
        assert!(result.is_err());
    }

    #[test]
    fn toml_overrides_apply_only_present_keys() {
        let mut config = Config {
            broker_host: "localhost".to_string(),
            broker_port: 61613,
            broker_user: None,
            broker_password: None,
            broker_topic: "darwin.pushport-v16".to_string(),
            broker_heartbeat_ms: 15_000,
            broker_backoff_max_ms: 60_000,
            store_path: PathBuf::from("railwatch.sqlite"),
            store_retention_days: 90,
            cache_max_entries: 500,
            cache_max_age: Duration::from_secs(86_400),
            server_listen: "0.0.0.0:8080".to_string(),
            server_request_timeout_ms: 5_000,
            rate_limit_default_per_min: 120,
            rate_limit_health_per_min: 60,
            cors_origins: vec!["*".to_string()],
            health_check_timeout_ms: 2_000,
            health_cache_ttl_ms: 1_000,
            log_path: None,
            log_max_size_bytes: 10 * 1024 * 1024,
            log_max_files: 10,
        };

        let overrides: TomlOverrides = toml::from_str("broker = { host = \"darwin.example\" }").unwrap();
        config.apply(overrides);

        assert_eq!(config.broker_host, "darwin.example");
        assert_eq!(config.broker_port, 61613);
    }
}

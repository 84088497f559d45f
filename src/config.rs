//! Configuration for the Telegram cleaner
//!
//! Loads configuration from config.yml file, `.env` and environment variables.

use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default constants (fallback if config.yml not found)
pub const SESSION_NAME: &str = "telegram_cleaner";
pub const LOCK_FILE: &str = "telegram_cleaner.lock";
pub const DATA_DIR: &str = "data";
pub const LOG_FILE: &str = "telegram_cleaner.log";
pub const PROBE_TEXT: &str = "/start";

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    telegram: Option<TelegramSection>,
    storage: Option<StorageSection>,
    governor: Option<GovernorSection>,
    cache: Option<CacheSection>,
    executor: Option<ExecutorSection>,
    probe: Option<ProbeSection>,
    metrics_addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramSection {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    api_id: Option<String>,
    api_hash: Option<String>,
    phone: Option<String>,
    session_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    data_dir: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct GovernorSection {
    max_rate: Option<usize>,
    period_secs: Option<f64>,
    min_delay: Option<f64>,
    max_delay: Option<f64>,
    max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheSection {
    max_age_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ExecutorSection {
    concurrency: Option<usize>,
    batch_size: Option<usize>,
    batch_pause_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeSection {
    text: Option<String>,
    settle_ms: Option<u64>,
    fetch_limit: Option<usize>,
    chat_delete_pause_ms: Option<u64>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Proactive and reactive limits of the rate governor.
#[derive(Debug, Clone, PartialEq)]
pub struct GovernorSettings {
    /// Calls allowed per rolling window.
    pub max_rate: usize,
    /// Rolling window length.
    pub period: Duration,
    /// Backoff floor in seconds.
    pub min_delay: f64,
    /// Backoff ceiling in seconds.
    pub max_delay: f64,
    /// Total attempts per call when the server keeps answering with flood waits.
    pub max_attempts: u32,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            max_rate: 20,
            period: Duration::from_secs(60),
            min_delay: 1.0,
            max_delay: 64.0,
            max_attempts: 5,
        }
    }
}

/// Concurrency and batching of bulk actions.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSettings {
    pub concurrency: usize,
    pub batch_size: usize,
    pub batch_pause: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            batch_size: 10,
            batch_pause: Duration::from_secs(5),
        }
    }
}

/// Dead-bot probing and chat deletion pacing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    pub text: String,
    pub settle: Duration,
    pub fetch_limit: usize,
    pub chat_delete_pause: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            text: PROBE_TEXT.to_string(),
            settle: Duration::from_secs(1),
            fetch_limit: 3,
            chat_delete_pause: Duration::from_secs(1),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    pub phone: Option<String>,
    pub session_name: String,
    pub lock_file: String,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub governor: GovernorSettings,
    pub cache_max_age: Duration,
    pub executor: ExecutorSettings,
    pub probe: ProbeSettings,
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| Self::from_yaml(YamlConfig::default()))
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if let Some(var_name) = v.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
                if let Ok(env_val) = std::env::var(var_name) {
                    return Some(env_val);
                }
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            if !env_val.is_empty() {
                return Some(env_val);
            }
        }
        value.filter(|v| !v.is_empty() && !v.starts_with("${"))
    }

    /// Resolve an integer value from string config or env var
    fn resolve_env_i32(value: Option<String>, env_key: &str) -> Option<i32> {
        if let Some(ref v) = value {
            if let Some(var_name) = v.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
                if let Some(parsed) = std::env::var(var_name)
                    .ok()
                    .and_then(|val| val.parse::<i32>().ok())
                {
                    return Some(parsed);
                }
            }
            // Explicit numbers in YAML win over the environment
            if let Ok(parsed) = v.parse::<i32>() {
                return Some(parsed);
            }
        }
        std::env::var(env_key)
            .ok()
            .and_then(|val| val.parse::<i32>().ok())
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)?;
        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let defaults = Self::defaults();
        let telegram = yaml.telegram.unwrap_or_default();
        let storage = yaml.storage.unwrap_or_default();
        let governor = yaml.governor.unwrap_or_default();
        let cache = yaml.cache.unwrap_or_default();
        let executor = yaml.executor.unwrap_or_default();
        let probe = yaml.probe.unwrap_or_default();

        let min_delay = governor
            .min_delay
            .filter(|d| *d > 0.0)
            .unwrap_or(defaults.governor.min_delay);

        let metrics_addr = Self::resolve_env_string(yaml.metrics_addr, "METRICS_ADDR")
            .and_then(|raw| match raw.parse::<SocketAddr>() {
                Ok(addr) => Some(addr),
                Err(err) => {
                    tracing::warn!(%raw, "Invalid metrics address: {}", err);
                    None
                }
            });

        Self {
            api_id: Self::resolve_env_i32(telegram.api_id, "TELEGRAM_API_ID"),
            api_hash: Self::resolve_env_string(telegram.api_hash, "TELEGRAM_API_HASH"),
            phone: Self::resolve_env_string(telegram.phone, "TELEGRAM_PHONE"),
            session_name: telegram.session_name.unwrap_or(defaults.session_name),
            lock_file: defaults.lock_file,
            data_dir: storage.data_dir.unwrap_or(defaults.data_dir),
            log_file: storage.log_file.unwrap_or(defaults.log_file),
            governor: GovernorSettings {
                max_rate: governor
                    .max_rate
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.governor.max_rate),
                period: governor
                    .period_secs
                    .filter(|s| *s > 0.0)
                    .map(Duration::from_secs_f64)
                    .unwrap_or(defaults.governor.period),
                min_delay,
                max_delay: governor
                    .max_delay
                    .unwrap_or(defaults.governor.max_delay)
                    .max(min_delay),
                max_attempts: governor
                    .max_attempts
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.governor.max_attempts),
            },
            cache_max_age: cache
                .max_age_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_max_age),
            executor: ExecutorSettings {
                concurrency: executor
                    .concurrency
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.executor.concurrency),
                batch_size: executor
                    .batch_size
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.executor.batch_size),
                batch_pause: executor
                    .batch_pause_secs
                    .filter(|s| *s >= 0.0)
                    .map(Duration::from_secs_f64)
                    .unwrap_or(defaults.executor.batch_pause),
            },
            probe: ProbeSettings {
                text: probe
                    .text
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or(defaults.probe.text),
                settle: probe
                    .settle_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.probe.settle),
                fetch_limit: probe
                    .fetch_limit
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.probe.fetch_limit),
                chat_delete_pause: probe
                    .chat_delete_pause_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.probe.chat_delete_pause),
            },
            metrics_addr,
        }
    }

    /// Built-in defaults. The interactive tool runs 15 probes at once.
    fn defaults() -> Self {
        Self {
            api_id: None,
            api_hash: None,
            phone: None,
            session_name: SESSION_NAME.to_string(),
            lock_file: LOCK_FILE.to_string(),
            data_dir: PathBuf::from(DATA_DIR),
            log_file: PathBuf::from(LOG_FILE),
            governor: GovernorSettings::default(),
            cache_max_age: Duration::from_secs(3600),
            executor: ExecutorSettings {
                concurrency: 15,
                ..ExecutorSettings::default()
            },
            probe: ProbeSettings::default(),
            metrics_addr: None,
        }
    }

    /// Session file path derived from the session name.
    pub fn session_file(&self) -> String {
        format!("{}.session", self.session_name)
    }
}

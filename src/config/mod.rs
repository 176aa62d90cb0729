//! TOML-driven configuration with environment overrides.
//!
//! Precedence: built-in defaults, then the file, then `QUEUEP_*` variables.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::core::dirty::DirtyCheckerConfig;
use crate::core::error::QueueError;
use crate::core::queue::{OverflowPolicy, QueueOptions, DEFAULT_INTERVAL};

pub const CONFIG_ENV: &str = "QUEUEP_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid queue definition: {0}")]
    Invalid(#[from] QueueError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueDefaults {
    pub interval_ms: u64,
    pub capacity: Option<usize>,
    pub overflow_policy: OverflowPolicy,
}

impl Default for QueueDefaults {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            capacity: None,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One `[[queues]]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueueDefinition {
    pub id: String,
    pub interval_ms: Option<u64>,
    pub capacity: Option<usize>,
    pub overflow_policy: Option<OverflowPolicy>,
    #[serde(default)]
    pub dirty_checker: DirtyCheckerConfig,
}

impl QueueDefinition {
    /// Options for this queue, minus the consumer which only code can supply.
    ///
    /// Building the dirty checker happens here, so bad checker arguments
    /// surface before any queue starts.
    pub fn options(&self, defaults: &QueueDefaults) -> Result<QueueOptions, QueueError> {
        let interval = Duration::from_millis(self.interval_ms.unwrap_or(defaults.interval_ms));
        Ok(QueueOptions::new()
            .interval(interval)
            .dirty_checker(self.dirty_checker.build()?)
            .capacity(self.capacity.or(defaults.capacity))
            .overflow_policy(self.overflow_policy.unwrap_or(defaults.overflow_policy)))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub defaults: QueueDefaults,
    pub logging: LoggingConfig,
    pub queues: Vec<QueueDefinition>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileDefaults {
    interval_ms: Option<u64>,
    capacity: Option<usize>,
    overflow_policy: Option<OverflowPolicy>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileLogging {
    level: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileConfig {
    #[serde(default)]
    defaults: FileDefaults,
    #[serde(default)]
    logging: FileLogging,
    #[serde(default)]
    queues: Vec<QueueDefinition>,
}

impl Config {
    /// Load configuration from an optional file path and environment variables.
    ///
    /// Without a path, `QUEUEP_CONFIG` is consulted; without either, only
    /// defaults and environment overrides apply.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let effective_path = path.map(str::to_string).or_else(|| env::var(CONFIG_ENV).ok());

        let file_cfg = match effective_path {
            Some(p) => Self::load_file(p)?,
            None => FileConfig::default(),
        };

        let config = Self::resolve(file_cfg, |name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document, applying defaults but no environment overrides.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let file_cfg: FileConfig = toml::from_str(raw)?;
        let config = Self::resolve(file_cfg, |_| None)?;
        config.validate()?;
        Ok(config)
    }

    fn load_file<P: AsRef<Path>>(path: P) -> Result<FileConfig, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    fn resolve<F>(file_cfg: FileConfig, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fallback = QueueDefaults::default();

        // File defaults.
        let mut interval_ms = file_cfg.defaults.interval_ms.unwrap_or(fallback.interval_ms);
        let mut capacity = file_cfg.defaults.capacity;
        let mut overflow_policy = file_cfg
            .defaults
            .overflow_policy
            .unwrap_or(fallback.overflow_policy);
        let mut level = file_cfg
            .logging
            .level
            .unwrap_or_else(|| LoggingConfig::default().level);

        // Env overrides.
        if let Some(v) = var("QUEUEP_DEFAULT_INTERVAL_MS") {
            interval_ms = v
                .parse()
                .map_err(|e| ConfigError::Parse(format!("QUEUEP_DEFAULT_INTERVAL_MS: {e}")))?;
        }

        if let Some(v) = var("QUEUEP_DEFAULT_CAPACITY") {
            capacity = Some(
                v.parse()
                    .map_err(|e| ConfigError::Parse(format!("QUEUEP_DEFAULT_CAPACITY: {e}")))?,
            );
        }

        if let Some(v) = var("QUEUEP_OVERFLOW_POLICY") {
            overflow_policy = v
                .parse()
                .map_err(|e| ConfigError::Parse(format!("QUEUEP_OVERFLOW_POLICY: {e}")))?;
        }

        if let Some(v) = var("QUEUEP_LOG_LEVEL") {
            level = v;
        }

        Ok(Config {
            defaults: QueueDefaults {
                interval_ms,
                capacity,
                overflow_policy,
            },
            logging: LoggingConfig { level },
            queues: file_cfg.queues,
        })
    }

    /// Rejects duplicate ids, zero intervals/capacities and bad checkers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.interval_ms == 0 {
            return Err(ConfigError::Parse("defaults.interval_ms must be > 0".into()));
        }
        if self.defaults.capacity == Some(0) {
            return Err(ConfigError::Parse("defaults.capacity must be > 0".into()));
        }

        let mut seen = HashSet::new();
        for queue in &self.queues {
            if !seen.insert(queue.id.as_str()) {
                return Err(ConfigError::Parse(format!(
                    "queue `{}` is defined twice",
                    queue.id
                )));
            }
            if queue.interval_ms == Some(0) {
                return Err(ConfigError::Parse(format!(
                    "queue `{}`: interval_ms must be > 0",
                    queue.id
                )));
            }
            if queue.capacity == Some(0) {
                return Err(ConfigError::Parse(format!(
                    "queue `{}`: capacity must be > 0",
                    queue.id
                )));
            }
            queue.dirty_checker.build()?;
        }
        Ok(())
    }

    pub fn queue(&self, id: &str) -> Option<&QueueDefinition> {
        self.queues.iter().find(|q| q.id == id)
    }
}

/// Convenience wrapper around [`Config::load`] for an explicit path.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let raw = path
        .to_str()
        .ok_or_else(|| ConfigError::Parse(format!("non UTF-8 path {}", path.display())))?;
    Config::load(Some(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
        [defaults]
        interval_ms = 25
        overflow_policy = "drop_oldest"

        [logging]
        level = "debug"

        [[queues]]
        id = "telemetry"
        interval_ms = 50
        capacity = 128
        [queues.dirty_checker]
        kind = "fields"
        fields = ["value"]

        [[queues]]
        id = "heartbeat"
    "#;

    #[test]
    fn parses_sample_document() {
        let cfg = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(cfg.defaults.interval_ms, 25);
        assert_eq!(cfg.defaults.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.queues.len(), 2);

        let heartbeat = cfg.queue("heartbeat").unwrap();
        assert_eq!(heartbeat.dirty_checker, DirtyCheckerConfig::Naive);

        let options = heartbeat.options(&cfg.defaults).unwrap();
        assert_eq!(options.interval, Duration::from_millis(25));
        assert_eq!(options.overflow_policy, OverflowPolicy::DropOldest);

        let telemetry = cfg.queue("telemetry").unwrap().options(&cfg.defaults).unwrap();
        assert_eq!(telemetry.interval, Duration::from_millis(50));
        assert_eq!(telemetry.capacity, Some(128));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.defaults.interval_ms, 10);
    }

    #[test]
    fn env_overrides_file_values() {
        let file: FileConfig = toml::from_str(SAMPLE).unwrap();
        let vars: HashMap<&str, &str> = HashMap::from([
            ("QUEUEP_DEFAULT_INTERVAL_MS", "5"),
            ("QUEUEP_DEFAULT_CAPACITY", "64"),
            ("QUEUEP_OVERFLOW_POLICY", "reject"),
            ("QUEUEP_LOG_LEVEL", "warn"),
        ]);

        let cfg = Config::resolve(file, |name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.defaults.interval_ms, 5);
        assert_eq!(cfg.defaults.capacity, Some(64));
        assert_eq!(cfg.defaults.overflow_policy, OverflowPolicy::Reject);
        assert_eq!(cfg.logging.level, "warn");
    }

    #[test]
    fn malformed_env_value_is_a_parse_error() {
        let err = Config::resolve(FileConfig::default(), |name| {
            (name == "QUEUEP_DEFAULT_INTERVAL_MS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("QUEUEP_DEFAULT_INTERVAL_MS")));
    }

    #[test]
    fn invalid_checker_is_rejected_at_load() {
        let raw = r#"
            [[queues]]
            id = "bad"
            [queues.dirty_checker]
            kind = "expiration"
            start = 10
            end = 1
        "#;
        assert!(matches!(
            Config::from_toml(raw),
            Err(ConfigError::Invalid(QueueError::Configuration(_)))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let raw = r#"
            [[queues]]
            id = "q"
            [[queues]]
            id = "q"
        "#;
        assert!(matches!(Config::from_toml(raw), Err(ConfigError::Parse(_))));
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bus::DEFAULT_CHANNEL_CAPACITY;
use crate::runtime::{AppVersion, DEFAULT_STATE_CAPACITY};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_state_capacity")]
    pub state_capacity: usize,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_state_capacity() -> usize {
    DEFAULT_STATE_CAPACITY
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_log_filter() -> String {
    "notewire=debug,info".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            state_capacity: default_state_capacity(),
            debounce_ms: default_debounce_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            log_filter: default_log_filter(),
            app_version: default_app_version(),
        }
    }
}

fn parse_override<T: std::str::FromStr>(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Option<T> {
    let raw = lookup(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring invalid {key}={trimmed}");
            None
        }
    }
}

impl AppConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn version(&self) -> Result<AppVersion, ConfigError> {
        self.app_version.parse().map_err(ConfigError::Invalid)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply `NOTEWIRE_*` overrides from `lookup`. Unparseable values are
    /// logged and skipped.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = parse_override("NOTEWIRE_CHANNEL_CAPACITY", &lookup) {
            self.channel_capacity = value;
        }
        if let Some(value) = parse_override("NOTEWIRE_STATE_CAPACITY", &lookup) {
            self.state_capacity = value;
        }
        if let Some(value) = parse_override("NOTEWIRE_DEBOUNCE_MS", &lookup) {
            self.debounce_ms = value;
        }
        if let Some(value) = parse_override("NOTEWIRE_REQUEST_TIMEOUT_MS", &lookup) {
            self.request_timeout_ms = value;
        }
        if let Some(filter) = lookup("NOTEWIRE_LOG").filter(|v| !v.trim().is_empty()) {
            self.log_filter = filter;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be > 0".to_string()));
        }
        if self.state_capacity == 0 {
            return Err(ConfigError::Invalid("state_capacity must be > 0".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be > 0".to_string()));
        }
        self.version()?;
        Ok(())
    }
}

/// Load configuration: optional JSON file, then `.env`, then `NOTEWIRE_*`
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&raw)?
        }
        None => AppConfig::default(),
    };

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("failed to load .env: {e}");
        }
    }
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "debounce_ms": 120, "app_version": "1.4.0" }}"#).unwrap();

        let config = load_config(Some(file.path())).expect("config loads");
        assert_eq!(config.debounce(), Duration::from_millis(120));
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.version().unwrap().to_string(), "1.4.0");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn overrides_apply_and_bad_values_are_skipped() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("NOTEWIRE_STATE_CAPACITY", "8"),
            ("NOTEWIRE_DEBOUNCE_MS", "soon"),
            ("NOTEWIRE_LOG", "notewire=trace"),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.state_capacity, 8);
        assert_eq!(config.debounce_ms, default_debounce_ms());
        assert_eq!(config.log_filter, "notewire=trace");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = AppConfig {
            channel_capacity: 0,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}

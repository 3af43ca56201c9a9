use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

use crate::checkers::{ProbeParams, RetryPolicy};
use crate::notifications::models::ChannelConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Duplicate target name: {0}")]
    DuplicateTarget(String),
    #[error("Invalid target '{name}': {reason}")]
    InvalidTarget { name: String, reason: String },
    #[error("Target '{target}' references undefined channel '{channel}'")]
    UnknownChannel { target: String, channel: String },
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}

/// One monitored system.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    pub name: String,
    pub host: String,
    /// Probe kind, e.g. `ping`, `http`, `tcp`.
    pub check: String,
    /// Channels notified on transitions.
    #[serde(default)]
    pub alerts: Vec<String>,
    /// Channels that also receive presence announcements.
    #[serde(default)]
    pub status_page: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub expected_status: Vec<u16>,
    #[serde(default)]
    pub content_match: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

impl TargetConfig {
    pub fn probe_params(&self) -> ProbeParams {
        ProbeParams {
            expected_status: self.expected_status.clone(),
            content_match: self.content_match.clone(),
        }
    }
}

/// Pre-cycle gate: when this address is unreachable the whole cycle is skipped.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityConfig {
    pub host: String,
    #[serde(default = "default_connectivity_check")]
    pub check: String,
    #[serde(default = "RetryPolicy::connectivity")]
    pub retry: RetryPolicy,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WatcherConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,

    #[serde(default = "default_state_file")]
    pub state_file: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub announce_on_start: bool,

    /// Retry policy for targets without their own.
    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub connectivity: Option<ConnectivityConfig>,

    #[serde(default)]
    pub channels: BTreeMap<String, ChannelConfig>,

    #[serde(default, rename = "target")]
    pub targets: Vec<TargetConfig>,
}

// Settings that may be overridden from the environment (`WATCHER_*`).
#[derive(Deserialize, Default, Debug)]
struct EnvOverrides {
    check_interval_seconds: Option<u64>,
    state_file: Option<String>,
    log_dir: Option<String>,
    announce_on_start: Option<bool>,
}

fn default_true() -> bool {
    true
}

fn default_check_interval() -> u64 {
    60
}

fn default_state_file() -> String {
    ".watcher_state".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_connectivity_check() -> String {
    "ping".to_string()
}

impl WatcherConfig {
    /// Loads the TOML file at `config_path`, applies `WATCHER_*` environment
    /// overrides (a `.env` file is honoured) and validates the result.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        info!(path = ?config_path, "Attempting to load config.");
        let contents = fs::read_to_string(config_path).map_err(|e| {
            error!(path = ?config_path, error = %e, "Failed to read config file.");
            ConfigError::Read {
                path: config_path.to_path_buf(),
                source: e,
            }
        })?;

        let mut config = Self::from_toml(&contents)?;
        let overrides: EnvOverrides = envy::prefixed("WATCHER_").from_env()?;
        config.apply_overrides(overrides);
        config.validate()?;

        info!(
            targets = config.targets.len(),
            channels = config.channels.len(),
            interval_seconds = config.check_interval_seconds,
            "Loaded config successfully."
        );
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_overrides(&mut self, overrides: EnvOverrides) {
        if let Some(interval) = overrides.check_interval_seconds {
            self.check_interval_seconds = interval;
        }
        if let Some(state_file) = overrides.state_file {
            self.state_file = state_file;
        }
        if let Some(log_dir) = overrides.log_dir {
            self.log_dir = log_dir;
        }
        if let Some(announce) = overrides.announce_on_start {
            self.announce_on_start = announce;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval_seconds == 0 {
            return Err(ConfigError::InvalidSetting(
                "check_interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::InvalidSetting(
                "retry.attempts must be at least 1".to_string(),
            ));
        }
        if let Some(connectivity) = &self.connectivity {
            if connectivity.host.trim().is_empty() {
                return Err(ConfigError::InvalidSetting(
                    "connectivity.host must not be empty".to_string(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            let invalid = |reason: &str| ConfigError::InvalidTarget {
                name: target.name.clone(),
                reason: reason.to_string(),
            };
            // Names are the key of the state file, whose fields are ':'-separated.
            if target.name.is_empty()
                || target.name.contains(':')
                || target.name.contains(['\n', '\r'])
            {
                return Err(invalid("name must be non-empty and free of ':' and line breaks"));
            }
            if !seen.insert(target.name.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.name.clone()));
            }
            if target.host.trim().is_empty() {
                return Err(invalid("host must not be empty"));
            }
            if target.check.trim().is_empty() {
                return Err(invalid("check must not be empty"));
            }
            if target.retry.is_some_and(|retry| retry.attempts == 0) {
                return Err(invalid("retry.attempts must be at least 1"));
            }
            for channel in target.alerts.iter().chain(&target.status_page) {
                if !self.channels.contains_key(channel) {
                    return Err(ConfigError::UnknownChannel {
                        target: target.name.clone(),
                        channel: channel.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn enabled_targets(&self) -> impl Iterator<Item = &TargetConfig> {
        self.targets.iter().filter(|target| target.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        check_interval_seconds = 30
        announce_on_start = true

        [connectivity]
        host = "192.168.1.1"

        [channels.ops]
        type = "email"
        recipient = "root"

        [channels.dashboard]
        type = "status_page"
        output_path = "status.html"

        [[target]]
        name = "web"
        host = "https://example.com"
        check = "http"
        alerts = ["ops"]
        status_page = ["dashboard"]
        expected_status = [200, 301]
        content_match = "Welcome"

        [[target]]
        name = "db"
        host = "10.0.0.5"
        check = "ping"
        alerts = ["ops"]
        enabled = false
        retry = { attempts = 1, timeout_seconds = 1 }
    "#;

    #[test]
    fn test_parse_sample() {
        let config = WatcherConfig::from_toml(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.check_interval_seconds, 30);
        assert_eq!(config.state_file, ".watcher_state");
        assert!(config.announce_on_start);
        assert_eq!(config.retry, RetryPolicy::default());

        let connectivity = config.connectivity.as_ref().unwrap();
        assert_eq!(connectivity.check, "ping");
        assert_eq!(connectivity.retry, RetryPolicy::connectivity());

        let names: Vec<&str> = config.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["web", "db"]);
        assert_eq!(config.enabled_targets().count(), 1);

        let web = &config.targets[0];
        assert_eq!(
            web.probe_params(),
            ProbeParams {
                expected_status: vec![200, 301],
                content_match: Some("Welcome".to_string()),
            }
        );

        let db_retry = config.targets[1].retry.unwrap();
        assert_eq!(db_retry.attempts, 1);
        assert_eq!(db_retry.delay_seconds, 2);
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let config = WatcherConfig::from_toml(
            r#"
            [[target]]
            name = "web"
            host = "a"
            check = "ping"

            [[target]]
            name = "web"
            host = "b"
            check = "ping"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateTarget(name)) if name == "web"));
    }

    #[test]
    fn test_name_with_separator_rejected() {
        let config = WatcherConfig::from_toml(
            r#"
            [[target]]
            name = "web:80"
            host = "a"
            check = "tcp"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTarget { .. })));
    }

    #[test]
    fn test_undefined_channel_rejected() {
        let config = WatcherConfig::from_toml(
            r#"
            [[target]]
            name = "web"
            host = "a"
            check = "http"
            alerts = ["pager"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownChannel { channel, .. }) if channel == "pager"
        ));
    }

    #[test]
    fn test_missing_required_field_is_parse_error() {
        let result = WatcherConfig::from_toml(
            r#"
            [[target]]
            name = "web"
            check = "http"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = WatcherConfig::from_toml(include_str!("../config.example.toml")).unwrap();
        config.validate().unwrap();

        assert_eq!(config.channels.len(), 4);
        assert_eq!(config.enabled_targets().count(), 3);
        assert!(matches!(
            config.channels.get("hook"),
            Some(ChannelConfig::Webhook { method, .. }) if method == "POST"
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = WatcherConfig::load(&path).unwrap();
        assert_eq!(config.targets.len(), 2);

        let missing = WatcherConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}

//! Probe strategies used to decide whether a target is reachable.
//!
//! Every strategy implements [`Checker`]. A single [`Checker::attempt`] is one
//! probe; [`Checker::check`] wraps it with the bounded retry loop described by
//! a [`RetryPolicy`]. Ordinary unreachability is `Ok(false)`, `Err` is kept for
//! faults that prevent the probe from running at all.
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub mod http;
pub mod ping;
pub mod tcp;

use http::HttpChecker;
use ping::PingChecker;
use tcp::TcpChecker;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Check type '{0}' is not supported")]
    UnsupportedKind(String),
    #[error("Probe could not be executed: {0}")]
    Execution(String),
}

/// Retry and backoff settings for one probe invocation.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_timeout_seconds() -> u64 {
    5
}

fn default_delay_seconds() -> u64 {
    2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            timeout_seconds: default_timeout_seconds(),
            delay_seconds: default_delay_seconds(),
        }
    }
}

impl RetryPolicy {
    /// Short policy used by the local connectivity check.
    pub fn connectivity() -> Self {
        Self {
            attempts: 2,
            timeout_seconds: 2,
            delay_seconds: 1,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }
}

/// Probe-specific parameters resolved from a target's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeParams {
    /// Acceptable HTTP status codes. Empty means `200` only.
    pub expected_status: Vec<u16>,
    /// Substring the HTTP response body must contain.
    pub content_match: Option<String>,
}

#[async_trait]
pub trait Checker: Send + Sync {
    /// Performs a single probe attempt bounded by `timeout`.
    async fn attempt(
        &self,
        address: &str,
        timeout: Duration,
        params: &ProbeParams,
    ) -> Result<bool, CheckError>;

    /// Runs attempts until one succeeds or the policy is exhausted.
    async fn check(
        &self,
        address: &str,
        policy: &RetryPolicy,
        params: &ProbeParams,
    ) -> Result<bool, CheckError> {
        let attempts = policy.attempts.max(1);
        for attempt in 1..=attempts {
            if self.attempt(address, policy.timeout(), params).await? {
                return Ok(true);
            }
            debug!(address, attempt, attempts, "Probe attempt failed.");
            if attempt < attempts && !policy.delay().is_zero() {
                tokio::time::sleep(policy.delay()).await;
            }
        }
        Ok(false)
    }
}

/// Maps a check kind (`ping`, `http`, ...) to its strategy.
#[derive(Clone, Default)]
pub struct CheckerRegistry {
    checkers: HashMap<String, Arc<dyn Checker>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("ping", Arc::new(PingChecker::new()));
        registry.register("http", Arc::new(HttpChecker::new()));
        registry.register("https", Arc::new(HttpChecker::with_scheme("https")));
        registry.register("tcp", Arc::new(TcpChecker::new()));
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, checker: Arc<dyn Checker>) {
        self.checkers.insert(kind.into(), checker);
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn Checker>, CheckError> {
        self.checkers
            .get(kind)
            .cloned()
            .ok_or_else(|| CheckError::UnsupportedKind(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.checkers.contains_key(kind)
    }

    /// Looks up `kind` and runs a full check against `address`.
    pub async fn check(
        &self,
        kind: &str,
        address: &str,
        policy: &RetryPolicy,
        params: &ProbeParams,
    ) -> Result<bool, CheckError> {
        self.get(kind)?.check(address, policy, params).await
    }
}

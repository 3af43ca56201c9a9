use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{CheckError, Checker, ProbeParams};

const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// HTTP(S) probe with a status-code allowlist and an optional body substring.
#[derive(Debug)]
pub struct HttpChecker {
    /// Scheme used for addresses that do not carry one.
    default_scheme: &'static str,
}

impl Default for HttpChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpChecker {
    pub fn new() -> Self {
        Self::with_scheme("http")
    }

    pub fn with_scheme(default_scheme: &'static str) -> Self {
        Self { default_scheme }
    }

    pub fn url_for(&self, address: &str) -> String {
        normalize_url(address, self.default_scheme)
    }
}

/// Prefixes `default_scheme://` when the address carries no scheme.
pub fn normalize_url(address: &str, default_scheme: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("{default_scheme}://{address}")
    }
}

fn status_allowed(status: u16, params: &ProbeParams) -> bool {
    if params.expected_status.is_empty() {
        status == DEFAULT_EXPECTED_STATUS
    } else {
        params.expected_status.contains(&status)
    }
}

#[async_trait]
impl Checker for HttpChecker {
    async fn attempt(
        &self,
        address: &str,
        timeout: Duration,
        params: &ProbeParams,
    ) -> Result<bool, CheckError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CheckError::Execution(format!("cannot build HTTP client: {e}")))?;
        let url = self.url_for(address);

        let response = match client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                if e.is_timeout() {
                    debug!(url = %url, "HTTP request timed out.");
                } else {
                    debug!(url = %url, error = %e, "HTTP request failed.");
                }
                return Ok(false);
            }
        };

        let status = response.status().as_u16();
        if !status_allowed(status, params) {
            debug!(url = %url, status, "Unexpected HTTP status.");
            return Ok(false);
        }

        let Some(needle) = params.content_match.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(true);
        };
        match response.text().await {
            Ok(body) => {
                let found = body.contains(needle);
                if !found {
                    debug!(url = %url, needle, "Expected content not found in response.");
                }
                Ok(found)
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Failed to read response body.");
                Ok(false)
            }
        }
    }
}

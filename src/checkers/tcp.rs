use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use super::{CheckError, Checker, ProbeParams};

/// Succeeds when a TCP connection to `host:port` can be established.
#[derive(Debug, Default)]
pub struct TcpChecker;

impl TcpChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Checker for TcpChecker {
    async fn attempt(
        &self,
        address: &str,
        timeout: Duration,
        _params: &ProbeParams,
    ) -> Result<bool, CheckError> {
        match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => Ok(true),
            Ok(Err(e)) => {
                debug!(address, error = %e, "TCP connection failed.");
                Ok(false)
            }
            Err(_) => {
                debug!(address, "TCP connection timed out.");
                Ok(false)
            }
        }
    }
}

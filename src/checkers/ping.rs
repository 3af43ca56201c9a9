use async_trait::async_trait;
use rand::random;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tracing::{debug, warn};

use super::{CheckError, Checker, ProbeParams};

/// ICMP echo probe.
///
/// Needs permission to open an ICMP socket. When the socket cannot be created
/// the probe reports an execution error rather than a down verdict.
#[derive(Debug, Default)]
pub struct PingChecker;

impl PingChecker {
    pub fn new() -> Self {
        Self
    }
}

async fn resolve(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    match tokio::net::lookup_host(format!("{host}:0")).await {
        Ok(mut addrs) => addrs.next().map(|addr| addr.ip()),
        Err(e) => {
            warn!(host, error = %e, "Failed to resolve target host.");
            None
        }
    }
}

#[async_trait]
impl Checker for PingChecker {
    async fn attempt(
        &self,
        address: &str,
        timeout: Duration,
        _params: &ProbeParams,
    ) -> Result<bool, CheckError> {
        let Some(target_addr) = resolve(address).await else {
            return Ok(false);
        };

        let config = match target_addr {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = Client::new(&config)
            .map_err(|e| CheckError::Execution(format!("cannot open ICMP socket: {e}")))?;

        let mut pinger = client.pinger(target_addr, PingIdentifier(random())).await;
        pinger.timeout(timeout);
        match pinger.ping(PingSequence(0), &[0; 8]).await {
            Ok((_reply, rtt)) => {
                debug!(address, rtt_ms = rtt.as_millis() as u64, "Ping reply received.");
                Ok(true)
            }
            Err(e) => {
                debug!(address, error = %e, "Ping failed.");
                Ok(false)
            }
        }
    }
}

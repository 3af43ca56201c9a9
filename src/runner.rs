//! Drives the transition engine, either once per process (cron style, state
//! persisted between invocations) or forever on a fixed interval.
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::alerting::{CycleOptions, CycleReport, TransitionEngine};
use crate::checkers::{CheckError, CheckerRegistry, ProbeParams};
use crate::config::{ConnectivityConfig, WatcherConfig};
use crate::notifications::service::NotificationService;
use crate::state::{PersistedState, StateStore};

/// Outcome of the local connectivity check run before each cycle.
#[derive(Debug)]
pub enum ConnectivityVerdict {
    NotConfigured,
    Reachable,
    Unreachable,
    /// The check itself could not run. Cycles proceed.
    CheckFailed(CheckError),
}

impl ConnectivityVerdict {
    pub fn allows_cycle(&self) -> bool {
        !matches!(self, ConnectivityVerdict::Unreachable)
    }
}

/// Owns configuration, strategy registries and the state store for the
/// lifetime of the process.
pub struct Watcher {
    config: Arc<WatcherConfig>,
    checkers: Arc<CheckerRegistry>,
    engine: TransitionEngine,
    store: StateStore,
    announce_next: bool,
}

impl Watcher {
    pub fn new(
        config: Arc<WatcherConfig>,
        checkers: Arc<CheckerRegistry>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        let engine = TransitionEngine::new(checkers.clone(), notifications, config.retry);
        let announce_next = config.announce_on_start;
        Self {
            config,
            checkers,
            engine,
            store: StateStore::new(),
            announce_next,
        }
    }

    /// Forces presence announcements on the next cycle.
    pub fn announce_next_cycle(&mut self) {
        self.announce_next = true;
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn state_file(&self) -> PathBuf {
        PathBuf::from(&self.config.state_file)
    }

    pub async fn check_connectivity(&self) -> ConnectivityVerdict {
        let Some(ConnectivityConfig { host, check, retry }) = self.config.connectivity.as_ref()
        else {
            return ConnectivityVerdict::NotConfigured;
        };
        match self
            .checkers
            .check(check, host, retry, &ProbeParams::default())
            .await
        {
            Ok(true) => ConnectivityVerdict::Reachable,
            Ok(false) => ConnectivityVerdict::Unreachable,
            Err(e) => ConnectivityVerdict::CheckFailed(e),
        }
    }

    /// Runs the connectivity gate and, if it passes, one engine cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let verdict = self.check_connectivity().await;
        if let ConnectivityVerdict::CheckFailed(e) = &verdict {
            error!(error = %e, "Connectivity check could not run, checking targets anyway.");
        }
        if !verdict.allows_cycle() {
            warn!(
                host = self.config.connectivity.as_ref().map(|c| c.host.as_str()),
                "Local connectivity check failed, skipping this cycle."
            );
            return CycleReport::aborted();
        }

        let options = CycleOptions {
            announce: std::mem::take(&mut self.announce_next),
        };
        let report = self
            .engine
            .run_cycle(&self.config.targets, &mut self.store, Utc::now(), options)
            .await;
        info!(
            healthy = report.healthy,
            checked = report.checked,
            skipped = report.skipped,
            transitions = report.transitions.len(),
            "Check cycle finished."
        );
        report
    }

    /// Loads the previous state, runs one cycle and saves the state again.
    /// Returns whether every checked target was healthy.
    pub async fn run_single_shot(&mut self) -> bool {
        let state_file = self.state_file();
        self.store.load_from(PersistedState::load(&state_file));

        let report = self.run_cycle().await;

        if let Err(e) = self.store.snapshot().save(&state_file) {
            error!(error = %e, "Error saving state.");
        }
        report.healthy
    }

    /// Runs cycles every `check_interval_seconds` until `shutdown_rx` fires.
    /// State is kept in memory only.
    pub async fn run_forever(&mut self, mut shutdown_rx: watch::Receiver<()>) {
        let interval = Duration::from_secs(self.config.check_interval_seconds.max(1));
        info!(
            targets = self.config.enabled_targets().count(),
            interval_seconds = interval.as_secs(),
            "Starting continuous monitoring."
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = self.run_cycle() => {}
            }
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("Shutdown signal received, monitoring stopped.");
    }
}

//! Per-cycle transition detection.
//!
//! For every enabled target the engine runs the configured probe, compares the
//! verdict with the stored [`TargetState`] and notifies the target's channels
//! when the status flips, or when a target is first seen down. Repeated
//! identical observations never touch the store and never notify.
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::checkers::{CheckerRegistry, RetryPolicy};
use crate::config::TargetConfig;
use crate::notifications::models::{Alert, AlertKind};
use crate::notifications::service::NotificationService;
use crate::state::{StateStore, TargetState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOptions {
    /// Announce every up target to its status-page channels.
    pub announce: bool,
}

/// A transition that produced a notification during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    pub target: String,
    pub kind: AlertKind,
    pub down_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// `true` when every successfully checked target was up.
    pub healthy: bool,
    pub checked: usize,
    /// Targets whose probe could not be executed.
    pub skipped: usize,
    pub transitions: Vec<TransitionRecord>,
}

impl Default for CycleReport {
    fn default() -> Self {
        Self {
            healthy: true,
            checked: 0,
            skipped: 0,
            transitions: Vec::new(),
        }
    }
}

impl CycleReport {
    /// Report for a cycle that was aborted before any target was checked.
    pub fn aborted() -> Self {
        Self {
            healthy: false,
            ..Self::default()
        }
    }
}

pub struct TransitionEngine {
    checkers: Arc<CheckerRegistry>,
    notifications: Arc<NotificationService>,
    default_retry: RetryPolicy,
}

impl TransitionEngine {
    pub fn new(
        checkers: Arc<CheckerRegistry>,
        notifications: Arc<NotificationService>,
        default_retry: RetryPolicy,
    ) -> Self {
        Self {
            checkers,
            notifications,
            default_retry,
        }
    }

    /// Checks every enabled target once, in declaration order.
    pub async fn run_cycle(
        &self,
        targets: &[TargetConfig],
        store: &mut StateStore,
        now: DateTime<Utc>,
        options: CycleOptions,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        for target in targets.iter().filter(|target| target.enabled) {
            let policy = target.retry.unwrap_or(self.default_retry);
            let observed = match self
                .checkers
                .check(&target.check, &target.host, &policy, &target.probe_params())
                .await
            {
                Ok(observed) => observed,
                Err(e) => {
                    error!(target = %target.name, check = %target.check, host = %target.host, error = %e, "Error performing check, skipping target.");
                    report.skipped += 1;
                    continue;
                }
            };
            report.checked += 1;
            report.healthy &= observed;

            if let Some(record) = self.observe(target, observed, store, now, options).await {
                report.transitions.push(record);
            }
        }

        report
    }

    async fn observe(
        &self,
        target: &TargetConfig,
        observed: bool,
        store: &mut StateStore,
        now: DateTime<Utc>,
        options: CycleOptions,
    ) -> Option<TransitionRecord> {
        let previous = store.get(&target.name).copied();

        let (kind, down_since) = match previous {
            None => {
                store.set(&target.name, TargetState::new(observed, now));
                if observed {
                    debug!(target = %target.name, host = %target.host, "Initial status: UP");
                    if options.announce {
                        self.announce(target, now).await;
                    }
                    return None;
                }
                warn!(target = %target.name, host = %target.host, "Initial status: DOWN");
                (AlertKind::Down, None)
            }
            Some(stored) if stored.status != observed => {
                store.set(&target.name, TargetState::new(observed, now));
                if observed {
                    info!(target = %target.name, host = %target.host, "RECOVERED: back UP");
                    (AlertKind::Recovered, Some(stored.last_change_at))
                } else {
                    warn!(target = %target.name, host = %target.host, "ALERT: DOWN");
                    (AlertKind::Down, None)
                }
            }
            Some(_) => {
                debug!(target = %target.name, host = %target.host, up = observed, "Status unchanged.");
                if observed && options.announce {
                    self.announce(target, now).await;
                }
                return None;
            }
        };

        let alert = Alert::new(&target.name, &target.host, &target.check, kind, now, down_since);
        self.dispatch(&transition_channels(target), &alert).await;

        Some(TransitionRecord {
            target: target.name.clone(),
            kind,
            down_since,
        })
    }

    async fn announce(&self, target: &TargetConfig, now: DateTime<Utc>) {
        let alert = Alert::new(&target.name, &target.host, &target.check, AlertKind::Up, now, None);
        self.dispatch(&target.status_page, &alert).await;
    }

    async fn dispatch(&self, channels: &[String], alert: &Alert) {
        if channels.is_empty() {
            return;
        }
        let delivered = self.notifications.notify_all(channels, alert).await;
        if delivered < channels.len() {
            warn!(
                target = %alert.target,
                kind = %alert.kind,
                delivered,
                channels = channels.len(),
                "Some notifications could not be delivered."
            );
        }
    }
}

/// Primary channels followed by status-page channels, each listed once.
fn transition_channels(target: &TargetConfig) -> Vec<String> {
    let mut channels = target.alerts.clone();
    for channel in &target.status_page {
        if !channels.contains(channel) {
            channels.push(channel.clone());
        }
    }
    channels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSender, ScriptedChecker};
    use chrono::Duration;

    const INTERVAL: i64 = 60;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn target(name: &str, check: &str) -> TargetConfig {
        TargetConfig {
            name: name.to_string(),
            host: format!("{name}.example.com"),
            check: check.to_string(),
            alerts: vec!["primary".to_string()],
            status_page: Vec::new(),
            enabled: true,
            expected_status: Vec::new(),
            content_match: None,
            retry: None,
        }
    }

    struct Harness {
        engine: TransitionEngine,
        primary: Arc<RecordingSender>,
        page: Arc<RecordingSender>,
    }

    fn harness(checkers: Vec<(&str, Arc<ScriptedChecker>)>) -> Harness {
        let mut registry = CheckerRegistry::new();
        for (kind, checker) in checkers {
            registry.register(kind, checker);
        }
        let primary = RecordingSender::new();
        let page = RecordingSender::new();
        let mut notifications = NotificationService::new();
        notifications.register("primary", primary.clone());
        notifications.register("page", page.clone());

        let single_attempt = RetryPolicy {
            attempts: 1,
            timeout_seconds: 1,
            delay_seconds: 0,
        };
        Harness {
            engine: TransitionEngine::new(Arc::new(registry), Arc::new(notifications), single_attempt),
            primary,
            page,
        }
    }

    #[tokio::test]
    async fn test_repeated_down_notifies_once() {
        let h = harness(vec![("scripted", ScriptedChecker::new([false, false, false]))]);
        let targets = vec![target("db", "scripted")];
        let mut store = StateStore::new();
        store.set("db", TargetState::new(true, at(0)));

        for cycle in 1..=3 {
            let report = h
                .engine
                .run_cycle(&targets, &mut store, at(cycle * INTERVAL), CycleOptions::default())
                .await;
            assert!(!report.healthy);
        }

        assert_eq!(h.primary.kinds(), vec![AlertKind::Down]);
        assert_eq!(store.get("db"), Some(&TargetState::new(false, at(INTERVAL))));
    }

    #[tokio::test]
    async fn test_initial_down_notifies_without_downtime() {
        let h = harness(vec![("scripted", ScriptedChecker::new([false]))]);
        let targets = vec![target("db", "scripted")];
        let mut store = StateStore::new();

        let report = h
            .engine
            .run_cycle(&targets, &mut store, at(100), CycleOptions::default())
            .await;

        assert!(!report.healthy);
        assert_eq!(
            report.transitions,
            vec![TransitionRecord {
                target: "db".to_string(),
                kind: AlertKind::Down,
                down_since: None,
            }]
        );
        let alerts = h.primary.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "System db is DOWN. Check type: scripted");
        assert_eq!(alerts[0].downtime(), None);
        assert_eq!(store.get("db"), Some(&TargetState::new(false, at(100))));
    }

    #[tokio::test]
    async fn test_initial_up_is_silent() {
        let h = harness(vec![("scripted", ScriptedChecker::new([true]))]);
        let targets = vec![target("web", "scripted")];
        let mut store = StateStore::new();

        let report = h
            .engine
            .run_cycle(&targets, &mut store, at(100), CycleOptions::default())
            .await;

        assert!(report.healthy);
        assert!(report.transitions.is_empty());
        assert!(h.primary.alerts().is_empty());
        assert_eq!(store.get("web"), Some(&TargetState::new(true, at(100))));
    }

    #[tokio::test]
    async fn test_identical_observations_are_idempotent() {
        let h = harness(vec![("scripted", ScriptedChecker::new([true]))]);
        let targets = vec![target("web", "scripted")];
        let mut store = StateStore::new();
        store.set("web", TargetState::new(true, at(5)));

        for cycle in 1..=4 {
            h.engine
                .run_cycle(&targets, &mut store, at(cycle * INTERVAL), CycleOptions::default())
                .await;
        }

        assert_eq!(store.get("web"), Some(&TargetState::new(true, at(5))));
        assert!(h.primary.alerts().is_empty());
        assert!(h.page.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_recovery_carries_previous_change_time() {
        let h = harness(vec![("scripted", ScriptedChecker::new([true]))]);
        let targets = vec![target("db", "scripted")];
        let mut store = StateStore::new();
        store.set("db", TargetState::new(false, at(1_000)));

        let now = at(1_000) + Duration::seconds(3_605);
        let report = h
            .engine
            .run_cycle(&targets, &mut store, now, CycleOptions::default())
            .await;

        assert!(report.healthy);
        assert_eq!(report.transitions[0].down_since, Some(at(1_000)));
        let alerts = h.primary.alerts();
        assert_eq!(alerts[0].kind, AlertKind::Recovered);
        assert_eq!(alerts[0].downtime_seconds(), Some(3_605));
        assert_eq!(alerts[0].downtime().as_deref(), Some("1 hours, 0 minutes, 5 seconds"));
        assert_eq!(store.get("db"), Some(&TargetState::new(true, now)));
    }

    #[tokio::test]
    async fn test_end_to_end_sequence() {
        let h = harness(vec![(
            "scripted",
            ScriptedChecker::new([true, true, false, false, true]),
        )]);
        let targets = vec![target("web", "scripted")];
        let mut store = StateStore::new();

        let mut fired = Vec::new();
        for cycle in 1..=5 {
            let report = h
                .engine
                .run_cycle(&targets, &mut store, at(cycle * INTERVAL), CycleOptions::default())
                .await;
            for record in report.transitions {
                fired.push((cycle, record.kind));
            }
        }

        assert_eq!(fired, vec![(3, AlertKind::Down), (5, AlertKind::Recovered)]);
        let alerts = h.primary.alerts();
        assert_eq!(alerts[1].downtime_seconds(), Some(2 * INTERVAL));
        assert_eq!(store.get("web"), Some(&TargetState::new(true, at(5 * INTERVAL))));
    }

    #[tokio::test]
    async fn test_probe_error_skips_target() {
        let h = harness(vec![
            ("broken", ScriptedChecker::failing("no raw socket")),
            ("scripted", ScriptedChecker::new([true])),
        ]);
        let targets = vec![
            target("db", "broken"),
            target("web", "scripted"),
            target("mail", "smtp"),
        ];
        let mut store = StateStore::new();
        store.set("db", TargetState::new(true, at(0)));

        let report = h
            .engine
            .run_cycle(&targets, &mut store, at(60), CycleOptions::default())
            .await;

        assert!(report.healthy);
        assert_eq!(report.checked, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(store.get("db"), Some(&TargetState::new(true, at(0))));
        assert!(store.get("mail").is_none());
        assert!(h.primary.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_targets_are_not_probed() {
        let checker = ScriptedChecker::new([false]);
        let h = harness(vec![("scripted", checker.clone())]);
        let mut disabled = target("db", "scripted");
        disabled.enabled = false;
        let mut store = StateStore::new();

        let report = h
            .engine
            .run_cycle(&[disabled], &mut store, at(60), CycleOptions::default())
            .await;

        assert!(report.healthy);
        assert_eq!(checker.attempts(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_transition() {
        let mut registry = CheckerRegistry::new();
        registry.register("scripted", ScriptedChecker::new([false, false]));
        let broken = RecordingSender::failing();
        let mut notifications = NotificationService::new();
        notifications.register("primary", broken.clone());
        let engine = TransitionEngine::new(
            Arc::new(registry),
            Arc::new(notifications),
            RetryPolicy {
                attempts: 1,
                timeout_seconds: 1,
                delay_seconds: 0,
            },
        );
        let targets = vec![target("db", "scripted")];
        let mut store = StateStore::new();
        store.set("db", TargetState::new(true, at(0)));

        engine
            .run_cycle(&targets, &mut store, at(60), CycleOptions::default())
            .await;
        engine
            .run_cycle(&targets, &mut store, at(120), CycleOptions::default())
            .await;

        // Delivery failed, yet the flip is recorded and never retried.
        assert_eq!(broken.kinds(), vec![AlertKind::Down]);
        assert_eq!(store.get("db"), Some(&TargetState::new(false, at(60))));
    }

    #[tokio::test]
    async fn test_announce_reaches_status_page_only() {
        let h = harness(vec![("scripted", ScriptedChecker::new([true]))]);
        let mut web = target("web", "scripted");
        web.status_page = vec!["page".to_string()];
        let mut api = target("api", "scripted");
        api.status_page = vec!["page".to_string()];
        let targets = vec![web, api];
        let mut store = StateStore::new();
        store.set("web", TargetState::new(true, at(0)));

        let announce = CycleOptions { announce: true };
        h.engine.run_cycle(&targets, &mut store, at(60), announce).await;
        h.engine
            .run_cycle(&targets, &mut store, at(120), CycleOptions::default())
            .await;

        assert!(h.primary.alerts().is_empty());
        assert_eq!(h.page.kinds(), vec![AlertKind::Up, AlertKind::Up]);
        assert_eq!(store.get("web"), Some(&TargetState::new(true, at(0))));
    }

    #[tokio::test]
    async fn test_channel_in_both_lists_notified_once() {
        let h = harness(vec![("scripted", ScriptedChecker::new([false]))]);
        let mut web = target("web", "scripted");
        web.status_page = vec!["primary".to_string(), "page".to_string()];
        let mut store = StateStore::new();
        store.set("web", TargetState::new(true, at(0)));

        h.engine
            .run_cycle(&[web], &mut store, at(60), CycleOptions::default())
            .await;

        assert_eq!(h.primary.kinds(), vec![AlertKind::Down]);
        assert_eq!(h.page.kinds(), vec![AlertKind::Down]);
    }

    #[tokio::test]
    async fn test_status_page_receives_transitions() {
        let h = harness(vec![("scripted", ScriptedChecker::new([false, true]))]);
        let mut web = target("web", "scripted");
        web.status_page = vec!["page".to_string()];
        let targets = vec![web];
        let mut store = StateStore::new();
        store.set("web", TargetState::new(true, at(0)));

        h.engine
            .run_cycle(&targets, &mut store, at(60), CycleOptions::default())
            .await;
        h.engine
            .run_cycle(&targets, &mut store, at(120), CycleOptions { announce: true })
            .await;

        assert_eq!(h.primary.kinds(), vec![AlertKind::Down, AlertKind::Recovered]);
        assert_eq!(h.page.kinds(), vec![AlertKind::Down, AlertKind::Recovered]);
    }
}

//! Test doubles shared by the unit tests.
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::checkers::{CheckError, Checker, ProbeParams};
use crate::notifications::models::{Alert, AlertKind};
use crate::notifications::senders::{NotificationSender, SenderError};

/// Probe returning pre-scripted verdicts, one per attempt. Once the script is
/// exhausted the last verdict repeats.
pub struct ScriptedChecker {
    script: Mutex<VecDeque<Result<bool, String>>>,
    last: Mutex<Result<bool, String>>,
    attempts: AtomicUsize,
}

impl ScriptedChecker {
    pub fn new(verdicts: impl IntoIterator<Item = bool>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(verdicts.into_iter().map(Ok).collect()),
            last: Mutex::new(Ok(true)),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(Err(reason.to_string())),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Checker for ScriptedChecker {
    async fn attempt(
        &self,
        _address: &str,
        _timeout: Duration,
        _params: &ProbeParams,
    ) -> Result<bool, CheckError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let verdict = match next {
            Some(verdict) => {
                *self.last.lock().unwrap() = verdict.clone();
                verdict
            }
            None => self.last.lock().unwrap().clone(),
        };
        verdict.map_err(CheckError::Execution)
    }
}

/// Sender that records every alert it receives.
pub struct RecordingSender {
    alerts: Mutex<Vec<Alert>>,
    fail: bool,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            alerts: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    /// Records alerts but reports every delivery as failed.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            alerts: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<AlertKind> {
        self.alerts().iter().map(|alert| alert.kind).collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError> {
        self.alerts.lock().unwrap().push(alert.clone());
        if self.fail {
            return Err(SenderError::SendFailed("channel unavailable".to_string()));
        }
        Ok(())
    }
}

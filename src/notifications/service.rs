use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use super::models::{Alert, ChannelConfig};
use super::senders::{NotificationSender, SenderError, build_sender};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Unsupported channel: {0}")]
    UnsupportedChannel(String),
    #[error("Failed to set up channel '{channel}': {source}")]
    ChannelSetup {
        channel: String,
        source: SenderError,
    },
    #[error("Sender error: {0}")]
    SenderError(#[from] SenderError),
}

/// Registry of named notification channels.
#[derive(Default, Clone)]
pub struct NotificationService {
    senders: HashMap<String, Arc<dyn NotificationSender>>,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one sender per configured channel.
    pub fn from_channels(
        channels: &BTreeMap<String, ChannelConfig>,
    ) -> Result<Self, NotificationError> {
        let mut service = Self::new();
        for (name, config) in channels {
            let sender = build_sender(config).map_err(|source| NotificationError::ChannelSetup {
                channel: name.clone(),
                source,
            })?;
            service.senders.insert(name.clone(), Arc::from(sender));
        }
        Ok(service)
    }

    pub fn register(&mut self, channel: impl Into<String>, sender: Arc<dyn NotificationSender>) {
        self.senders.insert(channel.into(), sender);
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.senders.contains_key(channel)
    }

    /// Dispatches `alert` to a specific channel.
    pub async fn send_notification(
        &self,
        channel: &str,
        alert: &Alert,
    ) -> Result<(), NotificationError> {
        let sender = self
            .senders
            .get(channel)
            .ok_or_else(|| NotificationError::UnsupportedChannel(channel.to_string()))?;
        sender.send(alert).await?;
        Ok(())
    }

    /// Same as [`send_notification`](Self::send_notification) but never fails:
    /// errors are logged and reported as `false`.
    pub async fn notify(&self, channel: &str, alert: &Alert) -> bool {
        match self.send_notification(channel, alert).await {
            Ok(()) => {
                debug!(channel, target = %alert.target, kind = %alert.kind, "Notification delivered.");
                true
            }
            Err(e) => {
                error!(channel, target = %alert.target, kind = %alert.kind, error = %e, "Failed to deliver notification.");
                false
            }
        }
    }

    /// Sends `alert` to every listed channel and returns how many succeeded.
    pub async fn notify_all(&self, channels: &[String], alert: &Alert) -> usize {
        let mut delivered = 0;
        for channel in channels {
            if self.notify(channel, alert).await {
                delivered += 1;
            }
        }
        delivered
    }
}

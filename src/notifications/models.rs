use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

use crate::alerting::downtime::format_downtime;

/// Configuration of one named notification channel.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// Hands the message to the local `mail` command.
    Email {
        recipient: String,
        #[serde(default = "default_mail_command")]
        command: String,
    },
    Webhook {
        url: String,
        #[serde(default = "default_webhook_method")]
        method: String, // "GET" or "POST"
        headers: Option<HashMap<String, String>>,
        body_template: Option<String>, // Tera template for POST requests
    },
    Telegram {
        bot_token: String,
        chat_id: String,
    },
    /// Renders an HTML overview of every reported target to `output_path`.
    StatusPage {
        output_path: String,
        #[serde(default = "default_status_page_title")]
        title: String,
    },
}

fn default_mail_command() -> String {
    "mail".to_string()
}

fn default_webhook_method() -> String {
    "POST".to_string()
}

fn default_status_page_title() -> String {
    "Service Status".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Down,
    Recovered,
    /// Presence announcement for a target that is up, sent to status pages only.
    Up,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Down => "DOWN",
            AlertKind::Recovered => "RECOVERED",
            AlertKind::Up => "UP",
        }
    }

    /// Whether the target is reachable after this event.
    pub fn is_up(&self) -> bool {
        !matches!(self, AlertKind::Down)
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload handed to every notification sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub target: String,
    pub address: String,
    pub check: String,
    pub kind: AlertKind,
    pub message: String,
    pub observed_at: DateTime<Utc>,
    /// Start of the outage that just ended. Only set on recovery.
    pub down_since: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        target: &str,
        address: &str,
        check: &str,
        kind: AlertKind,
        observed_at: DateTime<Utc>,
        down_since: Option<DateTime<Utc>>,
    ) -> Self {
        let message = match kind {
            AlertKind::Down => format!("System {target} is DOWN. Check type: {check}"),
            AlertKind::Recovered => format!("System {target} has RECOVERED. Check type: {check}"),
            AlertKind::Up => format!("System {target} is UP. Check type: {check}"),
        };
        Self {
            target: target.to_string(),
            address: address.to_string(),
            check: check.to_string(),
            kind,
            message,
            observed_at,
            down_since,
        }
    }

    /// Whole seconds between the start of the outage and this observation.
    pub fn downtime_seconds(&self) -> Option<i64> {
        self.down_since
            .map(|since| (self.observed_at - since).num_seconds().max(0))
    }

    pub fn downtime(&self) -> Option<String> {
        self.downtime_seconds().map(format_downtime)
    }

    /// Message followed by the outage duration when one is known.
    pub fn full_message(&self) -> String {
        match self.downtime() {
            Some(downtime) => format!("{}\nDowntime: {}", self.message, downtime),
            None => self.message.clone(),
        }
    }

    /// Flat key/value view used for templating.
    pub fn template_context(&self) -> HashMap<String, String> {
        let mut context = HashMap::new();
        context.insert("target".to_string(), self.target.clone());
        context.insert("address".to_string(), self.address.clone());
        context.insert("check".to_string(), self.check.clone());
        context.insert("kind".to_string(), self.kind.to_string());
        context.insert("message".to_string(), self.message.clone());
        context.insert("observed_at".to_string(), self.observed_at.to_rfc3339());
        if let Some(since) = self.down_since {
            context.insert("down_since".to_string(), since.to_rfc3339());
        }
        if let Some(downtime) = self.downtime() {
            context.insert("downtime".to_string(), downtime);
        }
        context
    }
}

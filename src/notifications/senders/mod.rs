use async_trait::async_trait;
use thiserror::Error;

use super::models::{Alert, ChannelConfig};

pub mod email;
pub mod status_page;
pub mod telegram;
pub mod webhook;

use email::EmailSender;
use status_page::StatusPageSender;
use telegram::TelegramSender;
use webhook::WebhookSender;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Templating error: {0}")]
    TemplatingError(String),
}

/// A trait for delivering an [`Alert`] through one channel.
/// All concrete senders (e-mail, webhook, Telegram, status page) implement it.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError>;
}

/// Builds the sender matching a channel configuration.
pub fn build_sender(config: &ChannelConfig) -> Result<Box<dyn NotificationSender>, SenderError> {
    let sender: Box<dyn NotificationSender> = match config {
        ChannelConfig::Email { recipient, command } => {
            Box::new(EmailSender::new(recipient.clone(), command.clone()))
        }
        ChannelConfig::Webhook {
            url,
            method,
            headers,
            body_template,
        } => Box::new(WebhookSender::new(
            url.clone(),
            method,
            headers.clone().unwrap_or_default(),
            body_template.clone(),
        )?),
        ChannelConfig::Telegram { bot_token, chat_id } => {
            Box::new(TelegramSender::new(bot_token.clone(), chat_id.clone()))
        }
        ChannelConfig::StatusPage { output_path, title } => {
            Box::new(StatusPageSender::new(output_path.into(), title.clone())?)
        }
    };
    Ok(sender)
}

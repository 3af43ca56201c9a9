use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{NotificationSender, SenderError};
use crate::notifications::models::{Alert, AlertKind};

/// A sender for pushing notifications via the Telegram Bot API.
pub struct TelegramSender {
    client: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramSender {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            client: Client::new(),
            bot_token,
            chat_id,
        }
    }
}

/// Escapes text for Telegram MarkdownV2.
/// Characters to escape: _ * [ ] ( ) ~ ` > # + - = | { } . !
fn escape_markdown_v2(text: &str) -> String {
    let mut escaped_text = String::with_capacity(text.len());
    for char_to_escape in text.chars() {
        match char_to_escape {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
            | '{' | '}' | '.' | '!' | '\\' => {
                escaped_text.push('\\');
                escaped_text.push(char_to_escape);
            }
            _ => escaped_text.push(char_to_escape),
        }
    }
    escaped_text
}

fn format_message(alert: &Alert) -> String {
    let icon = match alert.kind {
        AlertKind::Down => "🔴",
        AlertKind::Recovered => "🟢",
        AlertKind::Up => "⚪",
    };
    format!(
        "{icon} *{}*\n{}\nHost: {}",
        escape_markdown_v2(&alert.target),
        escape_markdown_v2(&alert.full_message()),
        escape_markdown_v2(&alert.address)
    )
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError> {
        let api_url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let text = format_message(alert);
        let payload = TelegramMessage {
            chat_id: &self.chat_id,
            text: &text,
            parse_mode: "MarkdownV2",
        };

        let response = self.client.post(&api_url).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Telegram API returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}

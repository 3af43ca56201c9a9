use async_trait::async_trait;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::warn;

use super::{NotificationSender, SenderError};
use crate::notifications::models::{Alert, AlertKind};

/// Sends mail through the system `mail` command (`mail -s <subject> <recipient>`).
pub struct EmailSender {
    recipient: String,
    command: String,
}

impl EmailSender {
    pub fn new(recipient: String, command: String) -> Self {
        Self { recipient, command }
    }
}

fn subject(alert: &Alert) -> String {
    match alert.kind {
        AlertKind::Down => format!("ALERT: {} ({}) is DOWN", alert.target, alert.address),
        AlertKind::Recovered => {
            format!("RECOVERED: {} ({}) is back UP", alert.target, alert.address)
        }
        AlertKind::Up => format!("STATUS: {} ({}) is UP", alert.target, alert.address),
    }
}

fn body(alert: &Alert) -> String {
    format!(
        "{}\n\nSystem: {}\nHost: {}",
        alert.full_message(),
        alert.target,
        alert.address
    )
}

/// Writes `input` to the child's stdin, closes it and waits for the exit.
/// The child is killed and reaped when the write fails.
async fn feed_and_wait(mut child: Child, input: &[u8]) -> io::Result<ExitStatus> {
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(input).await {
            drop(stdin);
            if let Err(kill_err) = child.kill().await {
                warn!(error = %kill_err, "Failed to stop mail command after write error.");
            }
            return Err(e);
        }
        // Closing stdin lets `mail` see end of input.
        drop(stdin);
    }
    child.wait().await
}

#[async_trait]
impl NotificationSender for EmailSender {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError> {
        let child = Command::new(&self.command)
            .arg("-s")
            .arg(subject(alert))
            .arg(&self.recipient)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let status = feed_and_wait(child, body(alert).as_bytes()).await?;
        if !status.success() {
            return Err(SenderError::SendFailed(format!(
                "{} exited with {status}",
                self.command
            )));
        }
        Ok(())
    }
}

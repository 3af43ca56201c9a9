use async_trait::async_trait;
use reqwest::{Client, Method, header};
use serde_json::{Value, json};
use std::collections::HashMap;
use tera::{Context, Tera};

use super::{NotificationSender, SenderError};
use crate::notifications::models::Alert;

/// A sender for pushing notifications via a custom webhook.
pub struct WebhookSender {
    client: Client,
    url: String,
    method: Method,
    headers: header::HeaderMap,
    body_template: Option<String>,
}

impl WebhookSender {
    pub fn new(
        url: String,
        method: &str,
        headers: HashMap<String, String>,
        body_template: Option<String>,
    ) -> Result<Self, SenderError> {
        let method = match method.to_uppercase().as_str() {
            "POST" => Method::POST,
            "GET" => Method::GET,
            _ => {
                return Err(SenderError::InvalidConfiguration(format!(
                    "Unsupported HTTP method: {method}"
                )));
            }
        };

        let mut header_map = header::HeaderMap::new();
        for (key, value) in &headers {
            let header_name = header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| SenderError::InvalidConfiguration(format!("Invalid header name: {e}")))?;
            let header_value = header::HeaderValue::from_str(value)
                .map_err(|e| SenderError::InvalidConfiguration(format!("Invalid header value: {e}")))?;
            header_map.insert(header_name, header_value);
        }

        Ok(Self {
            client: Client::new(),
            url,
            method,
            headers: header_map,
            body_template,
        })
    }

    /// Renders the POST body for `alert`. Without a configured template the
    /// body is a JSON object built from the alert fields.
    pub fn render_body(&self, alert: &Alert) -> Result<String, SenderError> {
        let Some(template) = self.body_template.as_deref() else {
            return Ok(default_body(alert).to_string());
        };
        let mut tera_context = Context::new();
        for (key, value) in alert.template_context() {
            tera_context.insert(key, &value);
        }
        Tera::one_off(template, &tera_context, false)
            .map_err(|e| SenderError::TemplatingError(e.to_string()))
    }
}

fn default_body(alert: &Alert) -> Value {
    let mut body = json!({
        "target": alert.target,
        "address": alert.address,
        "kind": alert.kind.as_str(),
        "message": alert.message,
    });
    if let Some(downtime) = alert.downtime() {
        body["downtime"] = Value::String(downtime);
    }
    body
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError> {
        let mut request_builder = self
            .client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone());

        if self.method == Method::POST {
            request_builder = request_builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(self.render_body(alert)?);
        } else {
            request_builder = request_builder.query(&[
                ("target", alert.target.as_str()),
                ("kind", alert.kind.as_str()),
                ("message", alert.message.as_str()),
            ]);
        }

        let response = request_builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}

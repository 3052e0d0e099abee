//! Discord webhook notifier

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::adapters::http::build_client;
use crate::core::channels::AlertMessage;
use crate::core::logging::sanitize;
use crate::notify::{Notifier, NotifyError};

/// Webhook payload, Discord caps `content` at 2000 characters
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

const MAX_CONTENT_CHARS: usize = 2000;

/// Posts each alert as a plain message to a Discord webhook
pub struct DiscordNotifier {
    webhook_url: String,
    http_client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>, request_timeout: Duration) -> Self {
        let webhook_url = webhook_url.into();
        info!(webhook = %sanitize(&webhook_url), "Discord notifier configured");
        Self {
            webhook_url,
            http_client: build_client(request_timeout),
        }
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            content: truncate(message.text()),
        };

        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(symbol = %message.symbol, "[NOTIFY] Alert posted to Discord");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

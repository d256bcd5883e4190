//! Telegram Bot API delivery

use super::ReportSink;
use crate::{
    config::TelegramConfig, monitor::CycleReport, stats::SummaryReport, DeliveryError,
    MonitorError, Result,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Default Telegram Bot API base URL
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram rejects messages longer than this many characters
const MAX_MESSAGE_CHARS: usize = 4096;

/// Sends reports to one Telegram chat
pub struct TelegramNotifier {
    http: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Create a notifier from bot settings
    pub fn new(config: &TelegramConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| TELEGRAM_API_URL.to_string()),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bot username reported by `getMe`
    pub async fn get_me(&self) -> Result<String> {
        let url = self.method_url("getMe");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                MonitorError::Connection(format!("Telegram request failed: {}", e.without_url()))
            })?;

        let body: TelegramResponse<TelegramUser> = response.json().await.map_err(|e| {
            MonitorError::ParseError(format!(
                "Failed to parse Telegram response: {}",
                e.without_url()
            ))
        })?;

        match body.result {
            Some(user) if body.ok => Ok(user.username.unwrap_or(user.first_name)),
            _ => {
                let reason = body
                    .description
                    .unwrap_or_else(|| "getMe failed".to_string());
                Err(MonitorError::Delivery(reason).into())
            }
        }
    }

    /// Send `text` inside a Markdown code block so column alignment survives
    pub async fn send_preformatted(&self, text: &str) -> std::result::Result<(), DeliveryError> {
        self.send_message(&code_block(text), Some("Markdown")).await
    }

    /// Send a plain message
    pub async fn send_message(
        &self,
        text: &str,
        parse_mode: Option<&str>,
    ) -> std::result::Result<(), DeliveryError> {
        let request = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode,
        };

        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError(format!("Telegram request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<TelegramResponse<serde_json::Value>> = serde_json::from_str(&body).ok();

        match parsed {
            Some(reply) if reply.ok && status.is_success() => {
                debug!(chars = text.chars().count(), "Telegram message sent");
                Ok(())
            }
            Some(reply) => Err(DeliveryError(format!(
                "Telegram API error {}: {}",
                status.as_u16(),
                reply.description.unwrap_or_default()
            ))),
            None => Err(DeliveryError(format!(
                "Telegram HTTP error {}: {}",
                status.as_u16(),
                body
            ))),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }
}

#[async_trait]
impl ReportSink for TelegramNotifier {
    async fn deliver(&self, report: &CycleReport) -> std::result::Result<(), DeliveryError> {
        self.send_preformatted(&report.render()).await?;
        info!(pairs = report.rated_pairs.len(), "Cycle report delivered");
        Ok(())
    }

    async fn deliver_summary(
        &self,
        summary: &SummaryReport,
    ) -> std::result::Result<(), DeliveryError> {
        self.send_preformatted(&summary.render()).await?;
        info!(checks = summary.total_checks, "Summary report delivered");
        Ok(())
    }

    async fn announce(&self, text: &str) -> std::result::Result<(), DeliveryError> {
        self.send_message(text, None).await
    }
}

/// Wrap `text` in a code block. Backticks inside would close the entity early.
fn code_block(text: &str) -> String {
    let body = truncate(&text.replace('`', "'"), MAX_MESSAGE_CHARS - 8);
    format!("```\n{}\n```", body)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(4)).collect();
    cut.push_str("\n...");
    cut
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "Option::default")]
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    first_name: String,
    #[serde(default)]
    username: Option<String>,
}

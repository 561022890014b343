//! Telegram delivery of conviction alerts


use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use crate::scoring::Alert;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
struct Target {
    api_base: String,
    bot_token: String,
    chat_id: String,
    parse_mode: String,
}

/// Sends Markdown messages to one chat; a disabled notifier drops them
#[derive(Debug, Clone)]
pub struct Notifier {
    http: Client,
    target: Option<Target>,
}

impl Notifier {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            http: build_client(),
            target: Some(Target {
                api_base: config.api_base.trim_end_matches('/').to_string(),
                bot_token: config.bot_token.clone(),
                chat_id: config.chat_id.clone(),
                parse_mode: config.parse_mode.clone(),
            }),
        }
    }

    pub fn disabled() -> Self {
        Self {
            http: build_client(),
            target: None,
        }
    }

    /// Enabled when configured, disabled otherwise
    pub fn from_config(config: Option<&TelegramConfig>) -> Self {
        match config {
            Some(tg) => Self::new(tg),
            None => {
                tracing::warn!("Telegram not configured, notifications disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// POST `text` to `sendMessage`
    pub async fn send(&self, text: &str) -> Result<()> {
        let Some(target) = &self.target else {
            tracing::debug!("Notifier disabled, dropping message");
            return Ok(());
        };

        let url = format!("{}/bot{}/sendMessage", target.api_base, target.bot_token);
        let request = SendMessageRequest {
            chat_id: &target.chat_id,
            text,
            parse_mode: &target.parse_mode,
        };

        let resp = self.http.post(&url).json(&request).send().await?;
        let status = resp.status();
        let body: SendMessageResponse = resp
            .json()
            .await
            .map_err(|e| BotError::Notify(format!("HTTP {}: {}", status, e)))?;

        if !status.is_success() || !body.ok {
            return Err(BotError::Notify(format!(
                "HTTP {}: {}",
                status,
                body.description.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        Ok(())
    }

    pub async fn conviction_alert(&self, alert: &Alert) -> Result<()> {
        tracing::info!("📣 Sending {} alert (score {})", alert.direction, alert.score);
        self.send(&alert.message()).await
    }
}

fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

//! Telegram delivery of the daily chat message.
//!
//! Credentials come from the env vars named in `[delivery]`. Missing
//! credentials or a disabled channel skip delivery; the orchestrator records
//! any failure in the run manifest and carries on.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

use strategy_scout_artifacts::DeliveryStatus;
use strategy_scout_shared::{DeliveryConfig, Result, ScoutError, secret_from_env};

use crate::collaborators::Deliver;

const USER_AGENT: &str = concat!("strategy-scout/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Clone)]
struct Credentials {
    token: String,
    chat_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Telegram Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramDelivery {
    client: Client,
    api_base: Url,
    enabled: bool,
    credentials: Option<Credentials>,
    missing: String,
}

impl TelegramDelivery {
    /// Build a client, reading bot token and chat id from the configured env vars.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self> {
        Self::new(
            config,
            secret_from_env(&config.bot_token_env),
            secret_from_env(&config.chat_id_env),
        )
    }

    pub fn new(
        config: &DeliveryConfig,
        token: Option<String>,
        chat_id: Option<String>,
    ) -> Result<Self> {
        let api_base = Url::parse(&config.api_base).map_err(|e| {
            ScoutError::config(format!("delivery.api_base '{}': {e}", config.api_base))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        let missing = [
            (token.is_none(), config.bot_token_env.as_str()),
            (chat_id.is_none(), config.chat_id_env.as_str()),
        ]
        .iter()
        .filter(|(absent, _)| *absent)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ");

        let credentials = match (token, chat_id) {
            (Some(token), Some(chat_id)) => Some(Credentials { token, chat_id }),
            _ => None,
        };

        Ok(Self {
            client,
            api_base,
            enabled: config.enabled,
            credentials,
            missing,
        })
    }

    /// Send `text` to the configured chat.
    #[instrument(skip_all, fields(chars = text.chars().count()))]
    pub async fn send(&self, text: &str) -> Result<DeliveryStatus> {
        if !self.enabled {
            info!("delivery disabled, skipping");
            return Ok(DeliveryStatus::Skipped {
                reason: "delivery disabled".into(),
            });
        }

        let Some(credentials) = &self.credentials else {
            warn!(missing = %self.missing, "delivery credentials not set, skipping");
            return Ok(DeliveryStatus::Skipped {
                reason: format!("missing credentials: {}", self.missing),
            });
        };

        let base = self.api_base.as_str().trim_end_matches('/');
        let endpoint = format!("{base}/bot{}/sendMessage", credentials.token);

        let response = self
            .client
            .post(&endpoint)
            .json(&SendMessage {
                chat_id: &credentials.chat_id,
                text,
                parse_mode: "Markdown",
                disable_web_page_preview: true,
            })
            .send()
            .await
            // The token is part of the URL
            .map_err(|e| {
                ScoutError::Delivery(format!("sendMessage request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let body: Option<ApiResponse> = response.json().await.ok();

        match body {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => {
                info!("digest delivered");
                Ok(DeliveryStatus::Sent)
            }
            Some(ApiResponse { description, .. }) => Err(ScoutError::Delivery(format!(
                "sendMessage returned HTTP {status}: {}",
                description.unwrap_or_else(|| "no description".into())
            ))),
            None => Err(ScoutError::Delivery(format!(
                "sendMessage returned HTTP {status} with an unreadable body"
            ))),
        }
    }
}

impl Deliver for TelegramDelivery {
    async fn deliver(&self, message: &str) -> Result<DeliveryStatus> {
        self.send(message).await
    }
}

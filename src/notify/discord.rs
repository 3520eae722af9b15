// src/notify/discord.rs
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Channel, ChannelResolver, NotificationPayload, NotifyError};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

// Upper bound for a server-requested rate limit pause.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Bot-token REST client. Cheap to clone; channel handles share it.
#[derive(Clone)]
pub struct DiscordClient {
    api_base: String,
    token: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordClient {
    pub fn new(token: String) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn post_message(
        &self,
        channel_id: u64,
        msg: &DiscordMessage,
    ) -> Result<(), NotifyError> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .header(AUTHORIZATION, self.auth())
                .timeout(self.timeout)
                .json(msg)
                .send()
                .await;

            let rsp = match res {
                Ok(rsp) => rsp,
                Err(e) => {
                    // A timed-out POST may have been delivered: never resend it.
                    if e.is_timeout() {
                        return Err(NotifyError::Http(e));
                    }
                    if attempt < self.max_retries {
                        tracing::debug!(attempt, error = %e, "discord send failed, retrying");
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(NotifyError::Http(e));
                }
            };

            let status = rsp.status();
            if status.is_success() {
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let header_secs = rsp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<f64>().ok());
                let body = rsp.text().await.unwrap_or_default();
                let wait = retry_after(&body, header_secs);
                if attempt < self.max_retries {
                    tracing::warn!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "discord rate limited"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                return Err(NotifyError::RateLimited {
                    retry_after_ms: wait.as_millis() as u64,
                });
            }

            let body = rsp.text().await.unwrap_or_default();
            if status.is_server_error() && attempt < self.max_retries {
                tracing::debug!(
                    attempt,
                    status = status.as_u16(),
                    "discord server error, retrying"
                );
                tokio::time::sleep(backoff(attempt)).await;
                continue;
            }
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }
    }
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt.saturating_sub(1)).min(6))
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

/// Body `retry_after` wins over the header; both are seconds.
fn retry_after(body: &str, header_secs: Option<f64>) -> Duration {
    let secs = serde_json::from_str::<RateLimitBody>(body)
        .ok()
        .map(|b| b.retry_after)
        .or(header_secs)
        .filter(|s| s.is_finite() && *s >= 0.0)
        .unwrap_or(1.0);
    Duration::from_secs_f64(secs).min(MAX_RETRY_AFTER)
}

#[async_trait::async_trait]
impl ChannelResolver for DiscordClient {
    type Handle = DiscordChannel;

    async fn resolve(&self, channel_id: u64) -> Result<DiscordChannel, NotifyError> {
        let rsp = self
            .client
            .get(format!("{}/channels/{channel_id}", self.api_base))
            .header(AUTHORIZATION, self.auth())
            .timeout(self.timeout)
            .send()
            .await?;

        match rsp.status() {
            s if s.is_success() => Ok(DiscordChannel {
                id: channel_id,
                client: self.clone(),
            }),
            StatusCode::NOT_FOUND => Err(NotifyError::ChannelNotFound(channel_id)),
            s => Err(NotifyError::Status {
                status: s.as_u16(),
                body: rsp.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct DiscordChannel {
    id: u64,
    client: DiscordClient,
}

#[async_trait::async_trait]
impl Channel for DiscordChannel {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        self.client
            .post_message(self.id, &DiscordMessage::from_payload(payload))
            .await
    }

    fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Serialize)]
struct EmbedText {
    text: String,
}

#[derive(Debug, Serialize)]
struct EmbedUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<EmbedText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedUrl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<EmbedUrl>,
}

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Serialize)]
pub struct DiscordMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordMessage {
    pub fn from_payload(p: &NotificationPayload) -> Self {
        let url = |u: &Option<String>| u.clone().map(|url| EmbedUrl { url });
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: p.title.clone(),
                description: p.description.clone(),
                color: p.color,
                footer: (!p.footer.is_empty()).then(|| EmbedText {
                    text: p.footer.clone(),
                }),
                image: url(&p.image_url),
                thumbnail: url(&p.thumbnail_url),
            }],
        }
    }
}

// src/notify/mod.rs
pub mod discord;
pub mod embed;

pub use discord::{DiscordChannel, DiscordClient};
pub use embed::EmbedRenderer;

/// Platform-neutral notification, fully rendered and already length-capped.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub footer: String,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("channel {0} not found")]
    ChannelNotFound(u64),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
}

/// A resolved destination that accepts notifications.
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError>;
    fn id(&self) -> u64;
}

/// Turns a configured channel id into a handle, once, at startup.
#[async_trait::async_trait]
pub trait ChannelResolver: Send + Sync {
    type Handle: Channel;

    async fn resolve(&self, channel_id: u64) -> Result<Self::Handle, NotifyError>;
}

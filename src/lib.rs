// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod poller;
pub mod selector;
pub mod state;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::ingest::{IncidentFetcher, IncidentRecord, IncidentSource};
pub use crate::notify::{
    Channel, ChannelResolver, DiscordClient, EmbedRenderer, NotificationPayload,
};
pub use crate::poller::{CycleReport, PollLoop, PollSettings};
pub use crate::state::{DedupState, DedupStore};

/// Wire the production loop from a loaded config.
pub fn build_poll_loop(cfg: &AppConfig) -> PollLoop<DiscordClient, IncidentFetcher> {
    let discord = DiscordClient::new(cfg.discord.token.clone())
        .with_api_base(cfg.discord.api_base.clone());
    let fetcher = IncidentFetcher::from_config(&cfg.api);
    let store = DedupStore::new(cfg.state.path.clone());
    let renderer = EmbedRenderer::new(cfg.mapbox.access_token.clone())
        .with_thumbnail(cfg.render.thumbnail_url.clone());
    PollLoop::new(discord, fetcher, store, renderer, PollSettings::from_config(cfg))
}

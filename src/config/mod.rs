// src/config/mod.rs
//! Process configuration: one TOML file, secrets optionally pulled from env.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::notify::discord::DEFAULT_API_BASE;
use crate::notify::embed::DEFAULT_THUMBNAIL_URL;
use crate::selector::DEFAULT_BATCH_CAP;
use crate::state::DEFAULT_STATE_PATH;

pub const DEFAULT_CONFIG_PATH: &str = "config/notifier.toml";
pub const ENV_CONFIG_PATH: &str = "NOTIFIER_CONFIG_PATH";
pub const ENV_DISCORD_TOKEN: &str = "DISCORD_BOT_TOKEN";
pub const ENV_MAPBOX_TOKEN: &str = "MAPBOX_ACCESS_TOKEN";

const ENV_SENTINEL: &str = "env";

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_base_url() -> String {
    "https://messerinzidenz.de".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_per_page() -> u32 {
    500
}
fn default_interval_secs() -> u64 {
    1800
}
fn default_batch_cap() -> usize {
    DEFAULT_BATCH_CAP
}
fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}
fn default_thumbnail_url() -> String {
    DEFAULT_THUMBNAIL_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Bot token, or "ENV" to read `$DISCORD_BOT_TOKEN`.
    pub token: String,
    pub channel_id: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapboxConfig {
    /// Access token, or "ENV" to read `$MAPBOX_ACCESS_TOKEN`.
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            per_page: default_per_page(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_batch_cap")]
    pub batch_cap: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            batch_cap: default_batch_cap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_thumbnail_url")]
    pub thumbnail_url: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            thumbnail_url: default_thumbnail_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// When unset no metrics listener is started.
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub mapbox: MapboxConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parsing notifier config")?;

        cfg.discord.token = resolve_secret(&cfg.discord.token, ENV_DISCORD_TOKEN)?;
        cfg.mapbox.access_token = resolve_secret(&cfg.mapbox.access_token, ENV_MAPBOX_TOKEN)?;

        if cfg.discord.channel_id == 0 {
            bail!("discord.channel_id must be set");
        }

        // Sanitize numeric knobs
        cfg.api.per_page = cfg.api.per_page.clamp(1, crate::ingest::window::MAX_PER_PAGE);
        cfg.api.timeout_secs = cfg.api.timeout_secs.max(1);
        cfg.poll.interval_secs = cfg.poll.interval_secs.max(1);
        cfg.poll.batch_cap = cfg.poll.batch_cap.max(1);

        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("in {}", path.display()))
    }

    /// `$NOTIFIER_CONFIG_PATH`, falling back to `config/notifier.toml`.
    pub fn load_default() -> Result<Self> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_file(path)
    }
}

fn resolve_secret(value: &str, env_name: &str) -> Result<String> {
    let v = value.trim();
    let resolved = if v.eq_ignore_ascii_case(ENV_SENTINEL) {
        env::var(env_name).map_err(|_| anyhow!("Missing {env_name} env var"))?
    } else {
        v.to_string()
    };
    if resolved.trim().is_empty() {
        bail!("empty secret (expected a value or \"ENV\" for {env_name})");
    }
    Ok(resolved.trim().to_string())
}

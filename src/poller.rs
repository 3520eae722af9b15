// src/poller.rs
//! The fetch → dedup → notify loop.
//!
//! One task, strictly sequential: channel resolved once, state loaded once,
//! then cycle + fixed sleep forever. Only a failed channel resolution ends
//! the loop.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};

use crate::config::AppConfig;
use crate::ingest::{IncidentQuery, IncidentSource};
use crate::metrics::ensure_metrics_described;
use crate::notify::{Channel, ChannelResolver, EmbedRenderer};
use crate::selector::{select_new, DEFAULT_BATCH_CAP};
use crate::state::{DedupState, DedupStore};

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub channel_id: u64,
    pub interval: Duration,
    pub batch_cap: usize,
    pub per_page: u32,
}

impl PollSettings {
    pub fn new(channel_id: u64) -> Self {
        Self {
            channel_id,
            interval: Duration::from_secs(1800),
            batch_cap: DEFAULT_BATCH_CAP,
            per_page: crate::ingest::window::MAX_PER_PAGE,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            channel_id: cfg.discord.channel_id,
            interval: Duration::from_secs(cfg.poll.interval_secs),
            batch_cap: cfg.poll.batch_cap,
            per_page: cfg.api.per_page,
        }
    }
}

/// What one cycle did; logged after every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetch_failed: bool,
    pub fetched: usize,
    pub new: usize,
    pub delivered: usize,
    pub failed: usize,
    /// New records held back by the batch cap.
    pub deferred: usize,
    pub persisted: bool,
}

pub struct PollLoop<R, S> {
    resolver: R,
    source: S,
    store: DedupStore,
    renderer: EmbedRenderer,
    settings: PollSettings,
}

impl<R, S> PollLoop<R, S>
where
    R: ChannelResolver,
    S: IncidentSource,
{
    pub fn new(
        resolver: R,
        source: S,
        store: DedupStore,
        renderer: EmbedRenderer,
        settings: PollSettings,
    ) -> Self {
        Self {
            resolver,
            source,
            store,
            renderer,
            settings,
        }
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    pub async fn resolve_channel(&self) -> Result<R::Handle> {
        self.resolver
            .resolve(self.settings.channel_id)
            .await
            .with_context(|| format!("resolving channel {}", self.settings.channel_id))
    }

    /// Runs until the process is stopped. Returns only if the channel cannot
    /// be resolved.
    pub async fn run(&self) -> Result<()> {
        ensure_metrics_described();

        let channel = match self.resolve_channel().await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(
                    channel_id = self.settings.channel_id,
                    "channel not available: {e:#}"
                );
                return Err(e);
            }
        };
        tracing::info!(channel_id = channel.id(), source = self.source.name(), "poll loop started");

        let mut state = self.store.load().await;
        loop {
            let report = self.run_cycle(&channel, &mut state, Utc::now()).await;
            tracing::info!(
                fetched = report.fetched,
                new = report.new,
                delivered = report.delivered,
                failed = report.failed,
                deferred = report.deferred,
                persisted = report.persisted,
                total = state.total_delivered(),
                "poll cycle finished"
            );
            tokio::time::sleep(self.settings.interval).await;
        }
    }

    /// One Active phase. Never fails: every error is logged and folded into
    /// the report.
    pub async fn run_cycle<C: Channel>(
        &self,
        channel: &C,
        state: &mut DedupState,
        now: DateTime<Utc>,
    ) -> CycleReport {
        counter!("incident_polls_total").increment(1);
        let mut report = CycleReport::default();

        // 1) window
        let query = IncidentQuery::for_instant(now, self.settings.per_page);

        // 2) fetch
        let raw = match self.source.fetch(&query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(source = self.source.name(), "fetching incidents failed: {e}");
                report.fetch_failed = true;
                finish_cycle(now, state);
                return report;
            }
        };
        report.fetched = raw.len();

        // 3) select
        let selection = select_new(&raw, state, self.settings.batch_cap);
        report.new = selection.new_total();
        report.deferred = selection.pending;
        if selection.is_empty() {
            tracing::info!(fetched = raw.len(), "no new incidents");
            finish_cycle(now, state);
            return report;
        }
        counter!("incidents_new_total").increment(report.new as u64);

        // 4) deliver in fetch order, one at a time
        for item in selection.batch {
            let ordinal = state.total_delivered();
            let payload = self.renderer.render(item, ordinal);
            match channel.send(&payload).await {
                Ok(()) => {
                    state.mark_delivered(&item.id);
                    report.delivered += 1;
                    counter!("incidents_delivered_total").increment(1);
                    tracing::info!(id = %item.id, ordinal, "incident delivered");
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("incident_delivery_errors_total").increment(1);
                    tracing::warn!(id = %item.id, "delivering incident failed: {e}");
                }
            }
        }

        // 5) persist once
        if report.delivered > 0 {
            match self.store.save(state).await {
                Ok(()) => report.persisted = true,
                Err(e) => {
                    counter!("incident_state_persist_errors_total").increment(1);
                    tracing::error!(
                        path = %self.store.path().display(),
                        "saving state failed: {e:#}"
                    );
                }
            }
        }

        finish_cycle(now, state);
        report
    }
}

fn finish_cycle(now: DateTime<Utc>, state: &DedupState) {
    gauge!("incident_poll_last_run_ts").set(now.timestamp() as f64);
    gauge!("incident_total_delivered").set(state.total_delivered() as f64);
}

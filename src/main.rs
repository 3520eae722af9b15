//! Incident notifier: binary entrypoint.
//! Loads config, starts logging/metrics and runs the poll loop until the
//! channel turns out to be unusable or the process receives Ctrl-C.

use anyhow::Result;
use incident_notifier::{build_poll_loop, metrics::Metrics, telemetry, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();

    let cfg = match AppConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("configuration error: {e:#}");
            return Err(e);
        }
    };

    let metrics = Metrics::init()?;
    if let Some(addr) = cfg.metrics.listen {
        metrics.serve(addr).await?;
    }

    let poll = build_poll_loop(&cfg);
    tracing::info!(
        channel_id = cfg.discord.channel_id,
        state = %cfg.state.path.display(),
        interval_secs = cfg.poll.interval_secs,
        "incident notifier starting"
    );

    tokio::select! {
        res = poll.run() => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down");
            Ok(())
        }
    }
}

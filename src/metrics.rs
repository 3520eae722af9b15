// src/metrics.rs
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("incident_polls_total", "Poll cycles started.");
        describe_counter!(
            "incident_fetch_errors_total",
            "Fetches that failed (status, transport or decode)."
        );
        describe_counter!("incident_fetched_total", "Incident records returned by the API.");
        describe_counter!("incidents_new_total", "Records not seen before, before the batch cap.");
        describe_counter!("incidents_delivered_total", "Notifications sent successfully.");
        describe_counter!(
            "incident_delivery_errors_total",
            "Notifications that could not be sent."
        );
        describe_counter!(
            "incident_state_persist_errors_total",
            "Failed writes of the state file."
        );
        describe_histogram!("incident_fetch_ms", "Incident API fetch time in milliseconds.");
        describe_gauge!("incident_poll_last_run_ts", "Unix ts of the last finished cycle.");
        describe_gauge!("incident_total_delivered", "All-time delivered counter.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` (Prometheus exposition) and `/health`.
    pub fn router(&self) -> Router {
        router_for(self.handle.clone())
    }

    /// Bind `addr` and serve the router in a background task.
    pub async fn serve(&self, addr: SocketAddr) -> Result<tokio::task::JoinHandle<()>> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener on {addr}"))?;
        let app = self.router();
        tracing::info!(%addr, "metrics listener up");
        Ok(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "metrics listener stopped");
            }
        }))
    }
}

pub fn router_for(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
}

// src/ingest/fetcher.rs
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::ingest::types::{IncidentRecord, IncidentSource};
use crate::ingest::window::IncidentQuery;
use crate::ingest::FetchError;

const RECORDS_PATH: &str = "/api/collections/incidents/records";

#[derive(Debug, Deserialize)]
struct RecordsPage {
    #[serde(default)]
    items: Vec<Value>,
}

/// HTTP client for the incidents collection.
#[derive(Clone)]
pub struct IncidentFetcher {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl IncidentFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(cfg: &ApiConfig) -> Self {
        Self::new(cfg.base_url.clone()).with_timeout(cfg.timeout_secs)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn records_url(&self) -> String {
        format!("{}{}", self.base_url, RECORDS_PATH)
    }

    async fn fetch_page(&self, query: &IncidentQuery) -> Result<Vec<IncidentRecord>, FetchError> {
        let rsp = self
            .client
            .get(self.records_url())
            .query(&query.params())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = rsp.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = rsp.text().await.map_err(FetchError::Transport)?;
        let page: RecordsPage = serde_json::from_str(&body).map_err(FetchError::Decode)?;
        Ok(parse_items(page.items))
    }
}

/// Convert raw items, skipping the ones that do not even carry an id.
fn parse_items(items: Vec<Value>) -> Vec<IncidentRecord> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match IncidentRecord::from_value(item) {
            Ok(rec) => out.push(rec),
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, "skipping malformed incident item");
            }
        }
    }
    out
}

#[async_trait]
impl IncidentSource for IncidentFetcher {
    async fn fetch(&self, query: &IncidentQuery) -> Result<Vec<IncidentRecord>, FetchError> {
        let t0 = Instant::now();
        let res = self.fetch_page(query).await;
        histogram!("incident_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match &res {
            Ok(items) => {
                counter!("incident_fetched_total").increment(items.len() as u64);
                tracing::debug!(target: "ingest", count = items.len(), "fetched incidents");
            }
            Err(e) => {
                counter!("incident_fetch_errors_total").increment(1);
                tracing::debug!(target: "ingest", error = %e, "incident fetch failed");
            }
        }
        res
    }

    fn name(&self) -> &'static str {
        "messerinzidenz"
    }
}

// src/ingest/mod.rs
pub mod fetcher;
pub mod types;
pub mod window;

pub use fetcher::IncidentFetcher;
pub use types::{Coordinates, GeoInfo, IncidentRecord, IncidentSource};
pub use window::{IncidentQuery, QueryWindow};

/// Why a poll produced no records. Every variant is recoverable.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("incident API returned HTTP {0}")]
    Status(u16),

    #[error("incident API request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("incident API body is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

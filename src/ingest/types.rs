// src/ingest/types.rs
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::window::IncidentQuery;
use crate::ingest::FetchError;

const ADMIN_AREA_LEVEL_1: &str = "administrative_area_level_1";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// What we keep from the geocoder payload attached to an incident.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoInfo {
    pub coordinates: Option<Coordinates>,
    /// Long name of the first-level administrative area (German "Bundesland").
    pub region: String,
}

impl GeoInfo {
    /// Lenient extraction: anything malformed simply yields no coordinates
    /// and/or an empty region.
    pub fn from_value(geo: &Value) -> Self {
        let lat = geo.get("lat").and_then(as_f64);
        let lng = geo.get("lng").and_then(as_f64);
        let coordinates = match (lat, lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                Some(Coordinates { lat, lng })
            }
            _ => None,
        };

        let region = geo
            .get("components")
            .and_then(Value::as_array)
            .and_then(|components| {
                // last matching component wins
                components.iter().rev().find_map(|c| {
                    let is_state = c
                        .get("types")
                        .and_then(Value::as_array)
                        .is_some_and(|types| {
                            types.iter().any(|t| t.as_str() == Some(ADMIN_AREA_LEVEL_1))
                        });
                    if is_state {
                        c.get("long_name").and_then(Value::as_str)
                    } else {
                        None
                    }
                })
            })
            .unwrap_or_default()
            .to_string();

        Self {
            coordinates,
            region,
        }
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One record of the `incidents` collection. Never mutated locally.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRecord {
    pub id: String,
    pub title: String,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub region: String,
    pub date: Option<String>,
    pub time_of_crime: Option<String>,
    pub wounded: bool,
    pub link: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIncident {
    id: String,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    location: Option<Value>,
    #[serde(default)]
    geo_data: Option<Value>,
    #[serde(default)]
    date: Option<Value>,
    #[serde(default)]
    time_of_crime: Option<Value>,
    #[serde(default)]
    wounded: Option<Value>,
    #[serde(default)]
    link: Option<Value>,
}

impl IncidentRecord {
    /// Parse a single API item. Only a missing/non-string `id` is an error;
    /// every other field degrades to a default.
    pub fn from_value(item: Value) -> Result<Self, serde_json::Error> {
        let raw: RawIncident = serde_json::from_value(item)?;
        let geo = raw
            .geo_data
            .as_ref()
            .map(GeoInfo::from_value)
            .unwrap_or_default();

        Ok(Self {
            id: raw.id,
            title: text(raw.title).unwrap_or_default(),
            location: text(raw.location).unwrap_or_default(),
            coordinates: geo.coordinates,
            region: geo.region,
            date: text(raw.date).filter(|s| !s.trim().is_empty()),
            time_of_crime: text(raw.time_of_crime).filter(|s| !s.trim().is_empty()),
            wounded: raw.wounded.as_ref().is_some_and(truthy),
            link: text(raw.link).unwrap_or_default(),
        })
    }
}

/// Only JSON strings count as text; anything else is treated as absent.
fn text(v: Option<Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => {
            matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "ja")
        }
        _ => false,
    }
}

/// Anything that can answer an incident query.
#[async_trait::async_trait]
pub trait IncidentSource: Send + Sync {
    async fn fetch(&self, query: &IncidentQuery) -> Result<Vec<IncidentRecord>, FetchError>;
    fn name(&self) -> &'static str;
}

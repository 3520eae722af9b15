// src/notify/embed.rs
//! Incident → embed rendering. Pure; no I/O.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::NotificationPayload;
use crate::ingest::{Coordinates, IncidentRecord};

pub const MAX_DESCRIPTION_CHARS: usize = 2048;
pub const MAX_TITLE_CHARS: usize = 256;
const ELLIPSIS: &str = "...";

pub const EMBED_COLOR: u32 = 0xFF0000;
pub const DEFAULT_THUMBNAIL_URL: &str = "https://i.imgur.com/P7H1PqY.png";

const MAPBOX_STATIC_BASE: &str = "https://api.mapbox.com/styles/v1/mapbox/streets-v11/static";
const MAP_ZOOM: &str = "18.0";
const MAP_SIZE: &str = "600x400";

const DISPLAY_TIME_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Clone)]
pub struct EmbedRenderer {
    mapbox_token: String,
    thumbnail_url: String,
}

impl EmbedRenderer {
    pub fn new(mapbox_token: impl Into<String>) -> Self {
        Self {
            mapbox_token: mapbox_token.into(),
            thumbnail_url: DEFAULT_THUMBNAIL_URL.to_string(),
        }
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = url.into();
        self
    }

    /// `ordinal` is the all-time number shown in the footer for this item.
    pub fn render(&self, item: &IncidentRecord, ordinal: u64) -> NotificationPayload {
        let when = item
            .time_of_crime
            .as_deref()
            .or(item.date.as_deref())
            .map(format_display_time)
            .unwrap_or_default();

        let description = format!(
            "📍 **Ort:** {}\n\
             🏛️ **Bundesland:** {}\n\
             🕰️ **Datum:** {}\n\
             🤕 **Verletzte:** {}\n\
             📰 **Pressemeldung:** [Details]({})\n",
            item.location,
            item.region,
            when,
            if item.wounded { "Ja" } else { "Nein" },
            item.link,
        );

        NotificationPayload {
            title: cap_chars(&format!("🚨 **{}**", item.title), MAX_TITLE_CHARS),
            description: cap_chars(&description, MAX_DESCRIPTION_CHARS),
            color: EMBED_COLOR,
            footer: format!("{ordinal} Messerangriffe insgesamt!"),
            image_url: item.coordinates.map(|c| self.static_map_url(c)),
            thumbnail_url: Some(self.thumbnail_url.clone()),
        }
    }

    pub fn static_map_url(&self, c: Coordinates) -> String {
        let (lng, lat) = (c.lng, c.lat);
        format!(
            "{MAPBOX_STATIC_BASE}/pin-l+FF0000({lng},{lat})/{lng},{lat},{MAP_ZOOM},0,0/\
             {MAP_SIZE}?access_token={}",
            self.mapbox_token
        )
    }
}

/// Keep at most `max` chars; longer text becomes `max - 3` chars plus `...`.
pub fn cap_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// `dd.mm.YYYY HH:MM` in UTC. Unparseable input is shown as-is.
pub fn format_display_time(raw: &str) -> String {
    match parse_api_time(raw) {
        Some(dt) => dt.format(DISPLAY_TIME_FORMAT).to_string(),
        None => raw.trim().to_string(),
    }
}

fn parse_api_time(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // PocketBase: "2024-03-15 10:20:30.123Z"
    let naive = s.strip_suffix('Z').unwrap_or(s);
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|n| n.and_utc())
}

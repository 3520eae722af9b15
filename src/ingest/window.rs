// src/ingest/window.rs
//! Query construction for "everything published today (UTC)".

use chrono::{DateTime, NaiveTime, TimeZone, Utc};

/// PocketBase datetime text, millisecond precision.
pub const API_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

/// Hard page size ceiling of the API.
pub const MAX_PER_PAGE: u32 = 500;

pub const FIELDS: &str = "id,title,geoData,date,link,location,wounded,timeOfCrime";

/// Inclusive `[start, end]` bounds of one UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QueryWindow {
    pub fn for_day_of(now: DateTime<Utc>) -> Self {
        let day = now.date_naive();
        let start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
        // 23:59:59.999 always exists on a UTC day
        let end_time = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        let end = Utc.from_utc_datetime(&day.and_time(end_time));
        Self { start, end }
    }

    pub fn start_text(&self) -> String {
        self.start.format(API_TIME_FORMAT).to_string()
    }

    pub fn end_text(&self) -> String {
        self.end.format(API_TIME_FORMAT).to_string()
    }

    /// Filter expression in the API's grammar.
    pub fn filter(&self) -> String {
        format!(
            "date>='{}'&&date<='{}'&&geoData!=null",
            self.start_text(),
            self.end_text()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentQuery {
    pub window: QueryWindow,
    pub per_page: u32,
}

impl IncidentQuery {
    pub fn new(window: QueryWindow, per_page: u32) -> Self {
        Self {
            window,
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Build the query for the day containing `now` and log it.
    pub fn for_instant(now: DateTime<Utc>, per_page: u32) -> Self {
        let q = Self::new(QueryWindow::for_day_of(now), per_page);
        tracing::info!(
            target: "ingest",
            filter = %q.window.filter(),
            per_page = q.per_page,
            "built incident query"
        );
        q
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", "1".to_string()),
            ("perPage", self.per_page.to_string()),
            ("skipTotal", "1".to_string()),
            ("fields", FIELDS.to_string()),
            ("filter", self.window.filter()),
        ]
    }
}

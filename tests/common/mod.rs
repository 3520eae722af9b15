// tests/common/mod.rs
// In-memory stand-ins for the incident API and the chat channel.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use incident_notifier::ingest::{
    Coordinates, FetchError, IncidentQuery, IncidentRecord, IncidentSource,
};
use incident_notifier::notify::{Channel, ChannelResolver, NotificationPayload, NotifyError};

pub fn record(id: &str) -> IncidentRecord {
    IncidentRecord {
        id: id.into(),
        title: format!("Messerangriff {id}"),
        location: "Marktplatz, Halle".into(),
        coordinates: Some(Coordinates {
            lat: 51.4825,
            lng: 11.9697,
        }),
        region: "Sachsen-Anhalt".into(),
        date: Some("2024-03-15 00:00:00.000Z".into()),
        time_of_crime: Some("2024-03-15 18:45:00.000Z".into()),
        wounded: true,
        link: format!("https://example.org/{id}"),
    }
}

pub fn records(prefix: &str, n: usize) -> Vec<IncidentRecord> {
    (0..n).map(|i| record(&format!("{prefix}{i}"))).collect()
}

/// Serves whatever was last put into it; `fail_with` makes it return a
/// status error instead.
#[derive(Clone, Default)]
pub struct StaticSource {
    pub records: Arc<Mutex<Vec<IncidentRecord>>>,
    pub fail_with: Arc<Mutex<Option<u16>>>,
    pub calls: Arc<AtomicUsize>,
    pub queries: Arc<Mutex<Vec<IncidentQuery>>>,
}

impl StaticSource {
    pub fn with(records: Vec<IncidentRecord>) -> Self {
        let s = Self::default();
        *s.records.lock().unwrap() = records;
        s
    }

    pub fn failing(status: u16) -> Self {
        let s = Self::default();
        *s.fail_with.lock().unwrap() = Some(status);
        s
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IncidentSource for StaticSource {
    async fn fetch(&self, query: &IncidentQuery) -> Result<Vec<IncidentRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        if let Some(status) = *self.fail_with.lock().unwrap() {
            return Err(FetchError::Status(status));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Records every payload; the next `fail_next` sends fail.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    pub sent: Arc<Mutex<Vec<NotificationPayload>>>,
    pub fail_next: Arc<AtomicUsize>,
}

impl RecordingChannel {
    pub fn sent(&self) -> Vec<NotificationPayload> {
        self.sent.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|p| p.title).collect()
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Channel for RecordingChannel {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(NotifyError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }

    fn id(&self) -> u64 {
        42
    }
}

/// Resolves only the configured id.
#[derive(Clone, Default)]
pub struct FixedResolver {
    pub known_id: u64,
    pub channel: RecordingChannel,
}

#[async_trait::async_trait]
impl ChannelResolver for FixedResolver {
    type Handle = RecordingChannel;

    async fn resolve(&self, channel_id: u64) -> Result<RecordingChannel, NotifyError> {
        if channel_id == self.known_id {
            Ok(self.channel.clone())
        } else {
            Err(NotifyError::ChannelNotFound(channel_id))
        }
    }
}

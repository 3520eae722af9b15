//! Renders a sample incident (or a JSON item from the file given as first
//! argument) and prints the Discord message body. Nothing is sent.

use anyhow::{Context, Result};
use incident_notifier::notify::discord::DiscordMessage;
use incident_notifier::{EmbedRenderer, IncidentRecord};

const SAMPLE: &str = r#"{
  "id": "sample0000001",
  "title": "Messerangriff am Hauptbahnhof",
  "location": "Hauptbahnhof, Köln",
  "geoData": {
    "lat": 50.9430,
    "lng": 6.9589,
    "components": [
      { "long_name": "Köln", "types": ["locality", "political"] },
      { "long_name": "Nordrhein-Westfalen", "types": ["administrative_area_level_1", "political"] }
    ]
  },
  "date": "2024-03-15 00:00:00.000Z",
  "timeOfCrime": "2024-03-15 21:07:00.000Z",
  "wounded": true,
  "link": "https://www.presseportal.de/blaulicht/"
}"#;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?,
        None => SAMPLE.to_string(),
    };
    let item: serde_json::Value = serde_json::from_str(&raw).context("parsing incident JSON")?;
    let record = IncidentRecord::from_value(item).context("incident item needs an id")?;

    let token = std::env::var("MAPBOX_ACCESS_TOKEN").unwrap_or_else(|_| "<mapbox-token>".into());
    let payload = EmbedRenderer::new(token).render(&record, 1);
    let body = serde_json::to_string_pretty(&DiscordMessage::from_payload(&payload))?;

    println!("{body}");
    Ok(())
}

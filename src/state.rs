// src/state.rs
//! Durable record of delivered incident ids and the all-time counter.
//!
//! On disk: `{ "entries": ["id", ...], "incident_count": n }`. A missing or
//! unreadable file is not an error: the agent starts from an empty list with
//! the counter seeded to 1.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const DEFAULT_STATE_PATH: &str = "/opt/knife_database.json";

fn seed_count() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupState {
    #[serde(default)]
    entries: Vec<String>,
    #[serde(default = "seed_count")]
    incident_count: u64,
    #[serde(skip)]
    index: HashSet<String>,
}

impl Default for DedupState {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            incident_count: seed_count(),
            index: HashSet::new(),
        }
    }
}

impl DedupState {
    /// Rebuild the lookup index after deserialization. Duplicate ids keep
    /// their first position.
    fn normalized(mut self) -> Self {
        let mut index = HashSet::with_capacity(self.entries.len());
        self.entries.retain(|id| index.insert(id.clone()));
        self.index = index;
        self.incident_count = self.incident_count.max(seed_count());
        self
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<DedupState>(s).map(Self::normalized)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Record one delivery. Returns `false` (and changes nothing) when the id
    /// is already known.
    pub fn mark_delivered(&mut self, id: &str) -> bool {
        if !self.index.insert(id.to_string()) {
            return false;
        }
        self.entries.push(id.to_string());
        self.incident_count += 1;
        true
    }

    /// All-time counter; the next delivery will be displayed with this value.
    pub fn total_delivered(&self) -> u64 {
        self.incident_count
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Single-writer JSON file store.
#[derive(Debug, Clone)]
pub struct DedupStore {
    path: PathBuf,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: absent or corrupt files fall back to the seed state.
    pub async fn load(&self) -> DedupState {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state file yet, starting empty");
                return DedupState::default();
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "reading state file failed, starting empty"
                );
                return DedupState::default();
            }
        };

        match DedupState::from_json(&raw) {
            Ok(state) => {
                tracing::info!(
                    path = %self.path.display(),
                    entries = state.len(),
                    incident_count = state.total_delivered(),
                    "loaded state"
                );
                state
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "state file is corrupt, starting empty"
                );
                DedupState::default()
            }
        }
    }

    /// Write-to-temp then rename, so a crash never leaves a half-written file
    /// under the real name.
    pub async fn save(&self, state: &DedupState) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating state dir {}", dir.display()))?;
        }

        let body = serde_json::to_vec(state).context("serializing state")?;
        let tmp = self.tmp_path();

        let mut file = fs::File::create(&tmp)
            .await
            .with_context(|| format!("creating {}", tmp.display()))?;
        file.write_all(&body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        file.sync_all()
            .await
            .with_context(|| format!("syncing {}", tmp.display()))?;
        drop(file);

        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

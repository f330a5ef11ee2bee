//! State File
//!
//! A JSON file tracking the records the CLI created or imported, so they can
//! be refreshed together.

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::provider::Provider;
use crate::resource::{Record, Resource};

const STATE_VERSION: u32 = 1;

/// One tracked record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub kind: String,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub resources: Vec<StateEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: Vec::new(),
        }
    }
}

/// Outcome of [`refresh_all`]
#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub removed: Vec<(String, i64)>,
    pub failed: Vec<(String, Option<i64>, String)>,
}

impl StateFile {
    /// Load a state file. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read state file {:?}", path))?;
        let state: StateFile =
            serde_json::from_str(&content).with_context(|| format!("Failed to parse state file {:?}", path))?;
        if state.version != STATE_VERSION {
            anyhow::bail!("Unsupported state file version {} in {:?}", state.version, path);
        }
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write state file {:?}", path))?;
        Ok(())
    }

    /// Insert a record, replacing any entry of the same kind and id
    pub fn upsert(&mut self, kind: &str, record: Record) {
        let id = record.id();
        match self
            .resources
            .iter_mut()
            .find(|e| e.kind == kind && id.is_some() && e.record.id() == id)
        {
            Some(entry) => entry.record = record,
            None => self.resources.push(StateEntry {
                kind: kind.to_string(),
                record,
            }),
        }
    }

    /// Remove the entry of this kind and id. Returns whether one was found.
    pub fn remove(&mut self, kind: &str, id: i64) -> bool {
        let before = self.resources.len();
        self.resources
            .retain(|e| !(e.kind == kind && e.record.id() == Some(id)));
        self.resources.len() != before
    }

    /// Starting record for re-reading `kind`/`id`. The tracked copy is used
    /// when there is one, since write-only inputs are never read back.
    pub fn seed(&self, kind: &str, id: i64) -> Record {
        self.get(kind, id).cloned().unwrap_or_else(|| Record::with_id(id))
    }

    pub fn get(&self, kind: &str, id: i64) -> Option<&Record> {
        self.resources
            .iter()
            .find(|e| e.kind == kind && e.record.id() == Some(id))
            .map(|e| &e.record)
    }
}

/// Re-read every tracked record concurrently.
///
/// Absent records are dropped. Records whose read fails stay untouched and
/// are reported in the summary.
pub async fn refresh_all(provider: &Provider, state: &mut StateFile) -> RefreshSummary {
    let reads = state.resources.iter().map(|entry| async move {
        let adapter = provider.resource(&entry.kind)?;
        adapter.read(entry.record.clone()).await
    });
    let results = join_all(reads).await;

    let mut summary = RefreshSummary::default();
    let mut kept = Vec::with_capacity(state.resources.len());

    for (entry, result) in state.resources.drain(..).zip(results) {
        match result {
            Ok(Some(record)) => {
                summary.refreshed += 1;
                kept.push(StateEntry {
                    kind: entry.kind,
                    record,
                });
            }
            Ok(None) => {
                let id = entry.record.id().unwrap_or_default();
                warn!("{} {} is gone, removing it from state", entry.kind, id);
                summary.removed.push((entry.kind, id));
            }
            Err(e) => {
                warn!("Failed to refresh {} {:?}: {}", entry.kind, entry.record.id(), e);
                summary
                    .failed
                    .push((entry.kind.clone(), entry.record.id(), e.to_string()));
                kept.push(entry);
            }
        }
    }

    state.resources = kept;
    summary
}

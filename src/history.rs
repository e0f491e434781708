//! Analysis history
//!
//! The analyzer itself keeps nothing between calls. Callers that want an
//! audit trail save [`AnalysisRecord`]s through an [`AnalysisStore`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::checksum::Checksum;
use crate::compatibility::EvolutionAnalysis;
use crate::error::{EvolutionError, Result};

/// A stored analysis with the checksums of the documents it compared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Checksum,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub old_checksum: Checksum,
    pub new_checksum: Checksum,
    pub analysis: EvolutionAnalysis,
}

impl AnalysisRecord {
    pub fn new(
        subject: Option<String>,
        old: &Value,
        new: &Value,
        analysis: EvolutionAnalysis,
    ) -> Result<Self> {
        Self::at(Utc::now(), subject, old, new, analysis)
    }

    /// Build a record with an explicit timestamp
    pub fn at(
        recorded_at: DateTime<Utc>,
        subject: Option<String>,
        old: &Value,
        new: &Value,
        analysis: EvolutionAnalysis,
    ) -> Result<Self> {
        let old_checksum = Checksum::from_json(old);
        let new_checksum = Checksum::from_json(new);
        let id = Checksum::from_json(&json!({
            "recordedAt": recorded_at,
            "subject": subject,
            "oldChecksum": old_checksum,
            "newChecksum": new_checksum,
            "analysis": serde_json::to_value(&analysis)?,
        }));
        Ok(Self {
            id,
            recorded_at,
            subject,
            old_checksum,
            new_checksum,
            analysis,
        })
    }
}

/// Caller-owned persistence for analysis records
pub trait AnalysisStore {
    /// Store a record, returning its id; saving the same record twice is a no-op
    fn save(&self, record: AnalysisRecord) -> Result<Checksum>;

    /// All records, oldest first
    fn list(&self) -> Result<Vec<AnalysisRecord>>;

    /// Look up a record by full id or unique id prefix
    fn get(&self, id: &str) -> Result<AnalysisRecord> {
        let mut matches = self
            .list()?
            .into_iter()
            .filter(|r| r.id.as_str().starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(record), None) if !id.is_empty() => Ok(record),
            _ => Err(EvolutionError::HistoryNotFound(id.to_string())),
        }
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AnalysisRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalysisStore for MemoryStore {
    fn save(&self, record: AnalysisRecord) -> Result<Checksum> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let id = record.id.clone();
        if !records.iter().any(|r| r.id == id) {
            records.push(record);
        }
        Ok(id)
    }

    fn list(&self) -> Result<Vec<AnalysisRecord>> {
        Ok(self.records.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

/// Store backed by a single JSON file holding an array of records
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<AnalysisRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, records: &[AnalysisRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // write-then-rename so readers never see a partial file
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(records)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl AnalysisStore for JsonFileStore {
    fn save(&self, record: AnalysisRecord) -> Result<Checksum> {
        let mut records = self.read()?;
        let id = record.id.clone();
        if !records.iter().any(|r| r.id == id) {
            records.push(record);
            self.write(&records)?;
            debug!(id = %id.short(), path = %self.path.display(), "analysis recorded");
        }
        Ok(id)
    }

    fn list(&self) -> Result<Vec<AnalysisRecord>> {
        self.read()
    }
}

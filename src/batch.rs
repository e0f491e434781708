//! Analysis across a sequence of schema versions
//!
//! Each version is compared with its predecessor or, transitively, with every
//! earlier version. A pair that fails to analyze is recorded and the batch
//! moves on.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::classify::CompatibilityMode;
use crate::compatibility::{EvolutionAnalysis, EvolutionAnalyzer};
use crate::error::Result;
use crate::version::{SchemaVersion, VersionBump};

/// A schema document tagged with its version
#[derive(Debug, Clone)]
pub struct VersionedSchema {
    pub version: SchemaVersion,
    pub document: Value,
}

impl VersionedSchema {
    pub fn new(version: SchemaVersion, document: Value) -> Self {
        Self { version, document }
    }
}

/// Version embedded in a file name (`user-v1.2.0.json`, `2.0.0.json`)
pub fn version_from_file_name(name: &str) -> Option<SchemaVersion> {
    let stem = name.strip_suffix(".json").unwrap_or(name);
    stem.char_indices()
        .filter(|(_, c)| c.is_ascii_digit())
        .find_map(|(i, _)| SchemaVersion::parse(&stem[i..]).ok())
}

/// Load every versioned `*.json` document under `dir`
///
/// Files without a version in their name are skipped. The result is sorted
/// by version.
pub fn load_directory(dir: &Path) -> Result<Vec<VersionedSchema>> {
    let mut schemas = Vec::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let Some(version) = version_from_file_name(&name) else {
            warn!(path = %path.display(), "no version in file name, skipping");
            continue;
        };
        let document: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        schemas.push(VersionedSchema::new(version, document));
    }

    schemas.sort_by(|a, b| a.version.cmp(&b.version));
    debug!(dir = %dir.display(), count = schemas.len(), "loaded schema versions");
    Ok(schemas)
}

/// Outcome of comparing one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PairOutcome {
    #[serde(rename_all = "camelCase")]
    Analyzed {
        analysis: EvolutionAnalysis,
        recommended_bump: VersionBump,
        actual_bump: VersionBump,
    },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub outcome: PairOutcome,
}

impl PairReport {
    pub fn analysis(&self) -> Option<&EvolutionAnalysis> {
        match &self.outcome {
            PairOutcome::Analyzed { analysis, .. } => Some(analysis),
            PairOutcome::Failed { .. } => None,
        }
    }

    /// Whether the version number understates the change
    pub fn is_under_versioned(&self) -> bool {
        match &self.outcome {
            PairOutcome::Analyzed { recommended_bump, actual_bump, .. } => actual_bump < recommended_bump,
            PairOutcome::Failed { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub mode: CompatibilityMode,
    pub transitive: bool,
    pub pairs: Vec<PairReport>,
}

impl BatchReport {
    /// True when every pair was analyzed and none is breaking
    pub fn is_compatible(&self) -> bool {
        self.pairs
            .iter()
            .all(|p| p.analysis().map(|a| a.is_compatible).unwrap_or(false))
    }

    pub fn failures(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs
            .iter()
            .filter(|p| matches!(p.outcome, PairOutcome::Failed { .. }))
    }
}

/// Compare a sequence of schema versions, oldest first after sorting
pub fn analyze_sequence(
    schemas: &[VersionedSchema],
    mode: CompatibilityMode,
    transitive: bool,
) -> BatchReport {
    let mut ordered: Vec<&VersionedSchema> = schemas.iter().collect();
    ordered.sort_by(|a, b| a.version.cmp(&b.version));

    let analyzer = EvolutionAnalyzer::new(mode);
    let mut pairs = Vec::new();

    for (index, newer) in ordered.iter().enumerate().skip(1) {
        let earlier = if transitive {
            &ordered[..index]
        } else {
            &ordered[index - 1..index]
        };
        for older in earlier {
            pairs.push(compare(&analyzer, older, newer));
        }
    }

    BatchReport {
        mode,
        transitive,
        pairs,
    }
}

fn compare(analyzer: &EvolutionAnalyzer, older: &VersionedSchema, newer: &VersionedSchema) -> PairReport {
    let outcome = match analyzer.analyze(&older.document, &newer.document) {
        Ok(analysis) => {
            debug!(
                from = %older.version,
                to = %newer.version,
                is_compatible = analysis.is_compatible,
                "pair analyzed"
            );
            PairOutcome::Analyzed {
                recommended_bump: VersionBump::recommend(&analysis),
                actual_bump: VersionBump::between(&older.version, &newer.version),
                analysis,
            }
        }
        Err(e) => {
            warn!(from = %older.version, to = %newer.version, error = %e, "analysis failed, continuing");
            PairOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    PairReport {
        from: older.version.clone(),
        to: newer.version.clone(),
        outcome,
    }
}

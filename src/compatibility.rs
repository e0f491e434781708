//! Schema evolution analysis
//!
//! Entry point tying the pipeline together: resolve both documents, diff the
//! resolved trees, classify each delta under the requested mode and plan the
//! migration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::classify::{classify_all, CompatibilityMode, Impact, SchemaChange};
use crate::diff::diff;
use crate::error::Result;
use crate::plan::{plan, MigrationStep};
use crate::resolve::resolve_document;

/// Result of comparing two schema versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionAnalysis {
    /// True when no change is breaking under `mode`
    pub is_compatible: bool,
    pub mode: CompatibilityMode,
    pub changes: Vec<SchemaChange>,
    pub migration_path: Vec<MigrationStep>,
}

impl EvolutionAnalysis {
    /// Changes that break the requested mode
    pub fn breaking_changes(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes.iter().filter(|c| c.breaking)
    }

    /// Worst impact present, `None` when nothing changed
    pub fn highest_impact(&self) -> Option<Impact> {
        self.changes.iter().map(|c| c.impact).max()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Compares schema versions under a fixed compatibility mode
#[derive(Debug, Clone, Copy, Default)]
pub struct EvolutionAnalyzer {
    mode: CompatibilityMode,
}

impl EvolutionAnalyzer {
    pub fn new(mode: CompatibilityMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> CompatibilityMode {
        self.mode
    }

    /// Analyze the evolution from `old` to `new`
    pub fn analyze(&self, old: &Value, new: &Value) -> Result<EvolutionAnalysis> {
        let old_tree = resolve_document(old)?;
        let new_tree = resolve_document(new)?;
        debug!(
            old_nodes = old_tree.node_count(),
            new_nodes = new_tree.node_count(),
            "resolved schemas"
        );

        let deltas = diff(&old_tree, &new_tree);
        let changes = classify_all(&deltas, self.mode);
        let migration_path = plan(&changes);
        let is_compatible = !changes.iter().any(|c| c.breaking);

        debug!(
            mode = %self.mode,
            changes = changes.len(),
            steps = migration_path.len(),
            is_compatible,
            "analysis complete"
        );

        Ok(EvolutionAnalysis {
            is_compatible,
            mode: self.mode,
            changes,
            migration_path,
        })
    }
}

/// Analyze the evolution from `old` to `new` under `mode`
pub fn analyze(old: &Value, new: &Value, mode: CompatibilityMode) -> Result<EvolutionAnalysis> {
    EvolutionAnalyzer::new(mode).analyze(old, new)
}

//! Schema Evolution
//!
//! Compatibility analysis between two versions of a JSON Schema document,
//! in the style of a schema registry's compatibility checks.
//!
//! ## Features
//!
//! - **Reference Resolution**: local `$ref`s are expanded, cycles become sentinels
//! - **Structural Diffing**: deterministic, path-addressed deltas
//! - **Compatibility Modes**: BACKWARD, FORWARD, FULL and NONE
//! - **Migration Planning**: ordered, actionable steps for breaking transitions
//! - **History**: optional, caller-owned record of past analyses
//!
//! ## Pipeline
//!
//! ```text
//! old, new ──▶ resolve ──▶ diff ──▶ classify(mode) ──▶ plan ──▶ EvolutionAnalysis
//! ```
//!
//! ```
//! use schema_evolution::{analyze, CompatibilityMode};
//! use serde_json::json;
//!
//! let old = json!({ "type": "object", "properties": { "name": { "type": "string" } } });
//! let new = json!({
//!     "type": "object",
//!     "properties": { "name": { "type": "string" }, "age": { "type": "integer" } },
//!     "required": ["age"]
//! });
//!
//! let analysis = analyze(&old, &new, CompatibilityMode::Backward).unwrap();
//! assert!(!analysis.is_compatible);
//! ```

pub mod batch;
pub mod checksum;
pub mod classify;
pub mod compatibility;
pub mod config;
pub mod diff;
pub mod error;
pub mod history;
pub mod plan;
pub mod resolve;
pub mod schema;
pub mod version;

pub use batch::{analyze_sequence, BatchReport, PairOutcome, PairReport, VersionedSchema};
pub use checksum::Checksum;
pub use classify::{classify, classify_all, CompatibilityMode, Impact, SchemaChange};
pub use compatibility::{analyze, EvolutionAnalysis, EvolutionAnalyzer};
pub use config::EvolutionConfig;
pub use diff::{diff, ChangeType, DeltaKind, NodeDelta};
pub use error::{EvolutionError, Result};
pub use history::{AnalysisRecord, AnalysisStore, JsonFileStore, MemoryStore};
pub use plan::{plan, MigrationStep};
pub use resolve::{resolve, resolve_document, Definitions};
pub use schema::{SchemaKind, SchemaTree};
pub use version::{SchemaVersion, VersionBump};

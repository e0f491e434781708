//! Configuration for the evolution checker
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (evolution.toml)
//! - Environment variables (SCHEMA_EVOLUTION__*)
//!
//! ## Example config file (evolution.toml):
//! ```toml
//! [analysis]
//! default_mode = "FULL"
//! fail_on_breaking = true
//! transitive = false
//!
//! [output]
//! format = "json"
//! pretty = true
//!
//! [history]
//! enabled = true
//! path = ".schema-history/analyses.json"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classify::CompatibilityMode;
use crate::error::Result;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Analysis settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// History settings
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Mode used when none is given on the command line
    #[serde(default)]
    pub default_mode: CompatibilityMode,

    /// Exit non-zero when a breaking change is found
    #[serde(default = "default_true")]
    pub fail_on_breaking: bool,

    /// Compare each version with every earlier one in batch runs
    #[serde(default)]
    pub transitive: bool,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default = "default_true")]
    pub pretty: bool,
}

/// History configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Record every `check` run
    #[serde(default)]
    pub enabled: bool,

    /// History file; defaults to the user data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_mode: CompatibilityMode::Backward,
            fail_on_breaking: true,
            transitive: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            pretty: true,
        }
    }
}

impl EvolutionConfig {
    /// Load configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["evolution.toml", ".evolution.toml", "config/evolution.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "schema-evolution", "schema-evolution") {
            let xdg_config = config_dir.config_dir().join("evolution.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCHEMA_EVOLUTION__ANALYSIS__DEFAULT_MODE=FULL
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_EVOLUTION")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(content, config_crate::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Resolved history file location
    pub fn history_path(&self) -> PathBuf {
        if let Some(path) = &self.history.path {
            return path.clone();
        }
        directories::ProjectDirs::from("dev", "schema-evolution", "schema-evolution")
            .map(|dirs| dirs.data_dir().join("analyses.json"))
            .unwrap_or_else(|| PathBuf::from(".schema-evolution").join("analyses.json"))
    }
}

//! Schema Evolution CLI
//!
//! Checks two JSON Schema versions, or a directory of versions, for
//! compatibility and prints the required migration steps.
//!
//! Usage:
//!   schema-evolution check old.json new.json --mode full
//!   schema-evolution batch schemas/user --transitive
//!   schema-evolution history
//!   schema-evolution config --write evolution.toml

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use schema_evolution::batch::load_directory;
use schema_evolution::config::OutputFormat;
use schema_evolution::{
    analyze_sequence, AnalysisRecord, AnalysisStore, BatchReport, CompatibilityMode,
    EvolutionAnalysis, EvolutionAnalyzer, EvolutionConfig, JsonFileStore, PairOutcome,
    VersionBump,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-evolution")]
#[command(about = "Check JSON Schema changes for compatibility")]
struct Cli {
    /// Configuration file (layered over evolution.toml and the environment)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output format, overriding the configuration
    #[arg(short, long, global = true)]
    format: Option<Format>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two schema documents
    Check {
        /// Previous schema version
        old: PathBuf,
        /// Proposed schema version
        new: PathBuf,
        /// BACKWARD, FORWARD, FULL or NONE
        #[arg(short, long)]
        mode: Option<String>,
        /// Subject name stored with the history record
        #[arg(short, long)]
        subject: Option<String>,
        /// Record the analysis even if history is disabled
        #[arg(long)]
        record: bool,
    },

    /// Compare every version in a directory, ordered by the version in each file name
    Batch {
        dir: PathBuf,
        #[arg(short, long)]
        mode: Option<String>,
        /// Compare each version with all earlier ones
        #[arg(long)]
        transitive: bool,
    },

    /// List recorded analyses
    History {
        /// History file (default: from configuration)
        #[arg(short, long)]
        path: Option<PathBuf>,
        /// Show one record by id or id prefix
        #[arg(long)]
        show: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Write it to this file instead
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = EvolutionConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let format = match cli.format {
        Some(Format::Text) => OutputFormat::Text,
        Some(Format::Json) => OutputFormat::Json,
        None => config.output.format,
    };

    match cli.command {
        Commands::Check {
            old,
            new,
            mode,
            subject,
            record,
        } => {
            let mode = resolve_mode(mode.as_deref(), &config)?;
            let old_doc = read_json(&old)?;
            let new_doc = read_json(&new)?;

            let analysis = EvolutionAnalyzer::new(mode)
                .analyze(&old_doc, &new_doc)
                .with_context(|| format!("analyzing {} -> {}", old.display(), new.display()))?;

            if config.history.enabled || record {
                let store = JsonFileStore::new(config.history_path());
                let entry = AnalysisRecord::new(subject, &old_doc, &new_doc, analysis.clone())?;
                let id = store.save(entry)?;
                info!(id = %id.short(), "analysis recorded");
            }

            match format {
                OutputFormat::Json => print_json(&analysis, config.output.pretty)?,
                OutputFormat::Text => {
                    println!("🔍 {} -> {} ({})\n", old.display(), new.display(), mode);
                    print_analysis(&analysis);
                }
            }

            Ok(exit_code(analysis.is_compatible, &config))
        }

        Commands::Batch {
            dir,
            mode,
            transitive,
        } => {
            let mode = resolve_mode(mode.as_deref(), &config)?;
            let schemas = load_directory(&dir).with_context(|| format!("loading {}", dir.display()))?;
            if schemas.len() < 2 {
                anyhow::bail!("need at least two versioned *.json files in {}", dir.display());
            }

            let report = analyze_sequence(&schemas, mode, transitive || config.analysis.transitive);

            match format {
                OutputFormat::Json => print_json(&report, config.output.pretty)?,
                OutputFormat::Text => print_batch(&report),
            }

            Ok(exit_code(report.is_compatible(), &config))
        }

        Commands::History { path, show } => {
            let store = JsonFileStore::new(path.unwrap_or_else(|| config.history_path()));

            if let Some(id) = show {
                let record = store.get(&id)?;
                match format {
                    OutputFormat::Json => print_json(&record, config.output.pretty)?,
                    OutputFormat::Text => {
                        println!(
                            "📄 {} {} {}\n",
                            record.id.short(),
                            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                            record.subject.as_deref().unwrap_or("-")
                        );
                        print_analysis(&record.analysis);
                    }
                }
                return Ok(0);
            }

            let records = store.list()?;
            match format {
                OutputFormat::Json => print_json(&records, config.output.pretty)?,
                OutputFormat::Text => {
                    if records.is_empty() {
                        println!("No analyses recorded in {}", store.path().display());
                    }
                    for record in &records {
                        println!(
                            "{}  {}  {:<8} {:<20} {} change(s)  {}",
                            record.id.short(),
                            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                            record.analysis.mode,
                            record.subject.as_deref().unwrap_or("-"),
                            record.analysis.changes.len(),
                            if record.analysis.is_compatible { "✅" } else { "❌" }
                        );
                    }
                }
            }
            Ok(0)
        }

        Commands::Config { write } => {
            match write {
                Some(path) => {
                    config
                        .save(&path)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("✅ Configuration written to {}", path.display());
                }
                None => print!("{}", config.to_toml()?),
            }
            Ok(0)
        }
    }
}

fn resolve_mode(arg: Option<&str>, config: &EvolutionConfig) -> anyhow::Result<CompatibilityMode> {
    match arg {
        Some(mode) => Ok(mode.parse()?),
        None => Ok(config.analysis.default_mode),
    }
}

fn exit_code(is_compatible: bool, config: &EvolutionConfig) -> i32 {
    if !is_compatible && config.analysis.fail_on_breaking {
        1
    } else {
        0
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

fn print_analysis(analysis: &EvolutionAnalysis) {
    if analysis.changes.is_empty() {
        println!("✅ No changes");
        return;
    }

    for change in &analysis.changes {
        let marker = if change.breaking { "❌" } else { "  " };
        println!("{} [{:<8}] {}", marker, change.impact.to_string(), change.description);
    }

    if !analysis.migration_path.is_empty() {
        println!("\n📋 Migration path:");
        for (i, step) in analysis.migration_path.iter().enumerate() {
            println!("  {}. {} ({}) [{}]", i + 1, step.action, step.field, step.impact);
            println!("     {}", step.description);
            if let Some(code) = &step.code {
                for line in code.lines() {
                    println!("       {}", line);
                }
            }
        }
    }

    let breaking = analysis.breaking_changes().count();
    println!();
    if breaking == 0 {
        println!("✅ Compatible under {} ({} change(s))", analysis.mode, analysis.changes.len());
    } else {
        println!("❌ {} breaking change(s) under {}", breaking, analysis.mode);
    }
    println!("💡 Recommended version bump: {}", VersionBump::recommend(analysis));
}

fn print_batch(report: &BatchReport) {
    println!(
        "🔍 {} pair(s), mode {}{}\n",
        report.pairs.len(),
        report.mode,
        if report.transitive { ", transitive" } else { "" }
    );

    for pair in &report.pairs {
        match &pair.outcome {
            PairOutcome::Analyzed {
                analysis,
                recommended_bump,
                actual_bump,
            } => {
                let status = if analysis.is_compatible { "✅" } else { "❌" };
                print!(
                    "{} {} -> {}: {} change(s), {} breaking",
                    status,
                    pair.from,
                    pair.to,
                    analysis.changes.len(),
                    analysis.breaking_changes().count()
                );
                if pair.is_under_versioned() {
                    print!("  ⚠️  {} bump but {} needed", actual_bump, recommended_bump);
                }
                println!();
                for change in analysis.breaking_changes() {
                    println!("     [{}] {}", change.impact, change.description);
                }
            }
            PairOutcome::Failed { error } => {
                println!("⚠️  {} -> {}: {}", pair.from, pair.to, error);
            }
        }
    }

    println!();
    if report.is_compatible() {
        println!("✅ All versions compatible");
    } else {
        println!("❌ Compatibility check failed");
    }
}

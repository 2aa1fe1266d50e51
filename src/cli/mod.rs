//! Command-line interface for anchorkit.
//!
//! Provides commands for recovering anchors after a document changed,
//! working through the review queue, and inspecting the matcher, the
//! coordinate bridge and the metadata aggregator on stored snapshots.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::aggregate::{aggregate_segmentation, AggregatedFields};
use crate::bridge::{to_geometry, CoordinateBridge, GeometrySelection};
use crate::config;
use crate::core::{
    DocumentSource, Outcome, RecoverOptions, RecoveryLog, RecoveryOrchestrator, SnapshotDir,
};
use crate::domain::{CharRange, Chunk, Segmentation, Span};
use crate::matching::TieredMatcher;

pub mod review;

/// anchorkit - Position recovery and metadata transfer for document annotations
#[derive(Parser, Debug)]
#[command(name = "anchorkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Re-locate every anchor of a document against its current snapshot
    Recover {
        /// Document ID (reads <snapshots>/<document-id>.json)
        document_id: String,

        /// Recompute anchors already recovered against this snapshot
        #[arg(short, long)]
        force: bool,
    },

    /// Work through anchors flagged for review
    Review {
        #[command(subcommand)]
        command: review::ReviewCommands,
    },

    /// Locate a piece of text in a document snapshot
    Locate {
        document_id: String,

        /// Text to find
        #[arg(short, long)]
        text: String,

        /// Page the text was selected on
        #[arg(short, long)]
        page: Option<u32>,

        /// Text preceding the selection
        #[arg(long, default_value = "")]
        before: String,

        /// Text following the selection
        #[arg(long, default_value = "")]
        after: String,
    },

    /// Map a flat-text range back to page geometry
    Geometry {
        document_id: String,

        #[arg(long)]
        start: usize,

        #[arg(long)]
        end: usize,
    },

    /// Transfer metadata from one segmentation onto another
    Aggregate {
        /// JSON array of source chunks
        #[arg(long)]
        source: PathBuf,

        /// JSON array of target chunks
        #[arg(long)]
        target: PathBuf,
    },

    /// Show the recovery log of a document
    History {
        document_id: String,

        /// Only events for this anchor
        #[arg(short, long)]
        anchor: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Recover { document_id, force } => recover(&document_id, force).await,
            Commands::Review { command } => review::execute(command).await,
            Commands::Locate {
                document_id,
                text,
                page,
                before,
                after,
            } => locate(&document_id, text, page, before, after).await,
            Commands::Geometry {
                document_id,
                start,
                end,
            } => geometry(&document_id, start, end).await,
            Commands::Aggregate { source, target } => aggregate(&source, &target).await,
            Commands::History {
                document_id,
                anchor,
            } => history(&document_id, anchor.as_deref()).await,
            Commands::Config => show_config(),
        }
    }
}

/// Parse an anchor ID argument
pub(crate) fn parse_anchor_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("Invalid anchor ID: {}", s))
}

/// Run a recovery batch and print the per-anchor outcomes
async fn recover(document_id: &str, force: bool) -> Result<()> {
    let cfg = config::config()?;
    let orchestrator = RecoveryOrchestrator::from_config(cfg);
    let report = orchestrator
        .recover_with(document_id, RecoverOptions { force })
        .await?;

    if report.outcomes.is_empty() {
        println!("No anchors for document {}", document_id);
        return Ok(());
    }

    println!(
        "{:<38} {:<13} {:<14} {:>6}  {}",
        "ANCHOR ID", "OUTCOME", "METHOD", "CONF", "RANGE"
    );
    println!("{}", "-".repeat(90));
    for o in &report.outcomes {
        let range = o
            .char_range
            .map(|r| format!("{}..{}", r.start, r.end))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<38} {:<13} {:<14} {:>6.2}  {}",
            o.anchor_id, o.outcome, o.method, o.confidence, range
        );
        if let Some(reason) = &o.reason {
            if o.outcome != Outcome::Recovered {
                println!("    {}", reason);
            }
        }
    }

    let counts = report.counts();
    eprintln!(
        "\n[{}: {} recovered, {} needs review, {} orphaned, {} skipped, {} failed]",
        document_id,
        counts.recovered,
        counts.needs_review,
        counts.orphaned,
        counts.skipped,
        counts.failed
    );
    Ok(())
}

async fn load_snapshot(document_id: &str) -> Result<crate::core::DocumentSnapshot> {
    SnapshotDir::from_config()?.snapshot(document_id).await
}

/// Run the matcher (or the bridge when a page is given) and print JSON
async fn locate(
    document_id: &str,
    text: String,
    page: Option<u32>,
    before: String,
    after: String,
) -> Result<()> {
    let cfg = config::config()?;
    let snapshot = load_snapshot(document_id).await?;
    let matcher = TieredMatcher::new(cfg.matching.clone());
    let index = matcher.index(&snapshot.text, snapshot.chunks)?;

    let result = match page {
        Some(page) => {
            let selection = GeometrySelection::new(text).with_context(before, after);
            CoordinateBridge::new(&matcher, &index).to_flat_offset(&selection, page)
        }
        None => {
            let span = Span {
                text,
                context_before: before,
                context_after: after,
                origin_chunk_id: None,
                origin_char_range: None,
                origin_geometry: None,
            };
            matcher.match_span(&span, &index)
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Print the paginated location of a flat-text range
async fn geometry(document_id: &str, start: usize, end: usize) -> Result<()> {
    if start >= end {
        anyhow::bail!("Empty range {}..{}", start, end);
    }
    let snapshot = load_snapshot(document_id).await?;
    let segmentation = Segmentation::new(snapshot.chunks, Some(snapshot.text.chars().count()))?;
    let location = to_geometry(&CharRange::new(start, end), segmentation.chunks());
    println!("{}", serde_json::to_string_pretty(&location)?);
    Ok(())
}

fn read_chunks(path: &Path) -> Result<Segmentation> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read segmentation: {}", path.display()))?;
    let chunks: Vec<Chunk> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse segmentation: {}", path.display()))?;
    Segmentation::new(chunks, None)
        .with_context(|| format!("Invalid segmentation: {}", path.display()))
}

/// Aggregate source metadata onto every target chunk and print JSON
async fn aggregate(source: &Path, target: &Path) -> Result<()> {
    let sources = read_chunks(source)?;
    let targets = read_chunks(target)?;
    let aggregated = aggregate_segmentation(&targets, &sources);

    // Field rules go to stderr so stdout stays valid JSON
    eprintln!(
        "Aggregated {} source chunks onto {} target chunks",
        sources.len(),
        targets.len()
    );
    for (field, kind) in AggregatedFields::FIELD_KINDS {
        eprintln!("  {:<18} {}", field, kind.as_str());
    }
    println!("{}", serde_json::to_string_pretty(&aggregated)?);
    Ok(())
}

/// Print the recovery log of a document
async fn history(document_id: &str, anchor: Option<&str>) -> Result<()> {
    let log = RecoveryLog::open(&config::logs_dir()?, document_id).await?;
    let events = match anchor {
        Some(id) => log.history(parse_anchor_id(id)?).await?,
        None => log.replay().await?,
    };

    if events.is_empty() {
        println!("No recovery events for {}", document_id);
        return Ok(());
    }

    for event in events {
        let anchor = event
            .anchor_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<17} {:<38} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            serde_json::to_value(event.event_type)?
                .as_str()
                .unwrap_or_default(),
            anchor,
            event.summary
        );
        if let Some(error) = event.error {
            println!("    {}", error);
        }
    }
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    print!("{}", serde_yaml::to_string(cfg).context("Failed to render config")?);
    Ok(())
}

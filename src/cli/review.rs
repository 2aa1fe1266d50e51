//! Review queue subcommands.
//!
//! - `list`: flagged anchors, filterable by band, kind and document
//! - `accept`: keep the current location
//! - `reject`: mark the anchor lost
//! - `relink`: place the anchor manually

use std::sync::Arc;

use anyhow::Result;
use clap::{Subcommand, ValueEnum};

use super::parse_anchor_id;
use crate::config;
use crate::core::{ConfidenceBand, JsonAnchorStore, ReviewFilter, ReviewQueue};
use crate::domain::{Anchor, CharRange, EntityKind};

#[derive(Subcommand, Debug)]
pub enum ReviewCommands {
    /// List anchors that need review
    List {
        #[arg(short, long, value_enum)]
        band: Option<BandArg>,

        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,

        /// Only anchors of this document
        #[arg(short, long)]
        document: Option<String>,
    },

    /// Accept the current location
    Accept { anchor_id: String },

    /// Mark the anchor lost
    Reject { anchor_id: String },

    /// Place the anchor at an explicit range
    Relink {
        anchor_id: String,

        #[arg(long)]
        start: usize,

        #[arg(long)]
        end: usize,

        /// Chunk IDs covering the new range (repeatable)
        #[arg(long = "chunk")]
        chunks: Vec<String>,
    },
}

/// Confidence band for CLI (maps to ConfidenceBand)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BandArg {
    High,
    Medium,
    Low,
}

impl From<BandArg> for ConfidenceBand {
    fn from(b: BandArg) -> Self {
        match b {
            BandArg::High => ConfidenceBand::High,
            BandArg::Medium => ConfidenceBand::Medium,
            BandArg::Low => ConfidenceBand::Low,
        }
    }
}

/// Entity kind for CLI (maps to EntityKind)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Annotation,
    Note,
    Flashcard,
    Spark,
}

impl From<KindArg> for EntityKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Annotation => EntityKind::Annotation,
            KindArg::Note => EntityKind::Note,
            KindArg::Flashcard => EntityKind::Flashcard,
            KindArg::Spark => EntityKind::Spark,
        }
    }
}

fn queue() -> Result<ReviewQueue> {
    Ok(
        ReviewQueue::new(Arc::new(JsonAnchorStore::from_config()?))
            .with_log_dir(config::logs_dir()?),
    )
}

fn print_anchor(anchor: &Anchor) {
    let range = anchor
        .current_char_range
        .map(|r| format!("{}..{}", r.start, r.end))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<38} {:<11} {:<14} {:>6.2}  {:<12} {}",
        anchor.id,
        anchor.entity_kind.as_str(),
        anchor.recovery_method,
        anchor.recovery_confidence,
        range,
        anchor.document_id
    );
}

/// Execute review subcommands
pub async fn execute(command: ReviewCommands) -> Result<()> {
    let queue = queue()?;
    match command {
        ReviewCommands::List {
            band,
            kind,
            document,
        } => {
            let filter = ReviewFilter {
                document_id: document,
                band: band.map(Into::into),
                kind: kind.map(Into::into),
            };
            let anchors = queue.list(&filter).await?;
            if anchors.is_empty() {
                println!("Review queue is empty");
                return Ok(());
            }
            println!(
                "{:<38} {:<11} {:<14} {:>6}  {:<12} {}",
                "ANCHOR ID", "KIND", "METHOD", "CONF", "RANGE", "DOCUMENT"
            );
            println!("{}", "-".repeat(100));
            for anchor in &anchors {
                print_anchor(anchor);
                if let Some(reason) = &anchor.review_reason {
                    println!("    {}", reason);
                }
            }
            eprintln!("\n[{} anchors need review]", anchors.len());
        }
        ReviewCommands::Accept { anchor_id } => {
            let anchor = queue.accept(parse_anchor_id(&anchor_id)?).await?;
            print_anchor(&anchor);
        }
        ReviewCommands::Reject { anchor_id } => {
            let anchor = queue.reject(parse_anchor_id(&anchor_id)?).await?;
            print_anchor(&anchor);
        }
        ReviewCommands::Relink {
            anchor_id,
            start,
            end,
            chunks,
        } => {
            let anchor = queue
                .relink(parse_anchor_id(&anchor_id)?, CharRange::new(start, end), chunks)
                .await?;
            print_anchor(&anchor);
        }
    }
    Ok(())
}

//! anchorkit - Position recovery and metadata transfer for document annotations
//!
//! Keeps user annotations attached to the right text after a document is
//! re-extracted, re-chunked or edited.
//!
//! # Architecture
//!
//! Matching and aggregation are pure, synchronous computations over a
//! read-only document snapshot. Only the recovery orchestrator does I/O:
//! - Anchors are re-located span by span through an ordered list of match tiers
//! - Anchors that text matching cannot place fall back to embedding similarity
//! - Every decision is written per anchor and appended to an audit log
//!
//! # Modules
//!
//! - `domain`: Data structures (Span, Anchor, Chunk, RecoveryEvent)
//! - `matching`: Normalization, similarity primitives, tiered matcher
//! - `bridge`: Paginated geometry <-> flat-text offsets
//! - `aggregate`: Metadata transfer between segmentations
//! - `core`: Recovery orchestration, stores, review queue
//! - `adapters`: Embedding service integration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Re-locate anchors after <snapshots>/doc-42.json changed
//! anchorkit recover doc-42
//!
//! # Work through the review queue
//! anchorkit review list --band medium
//! anchorkit review accept <anchor-id>
//! ```

pub mod adapters;
pub mod aggregate;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod matching;

// Re-export main types at crate root for convenience
pub use aggregate::{aggregate, AggregatedFields, AggregatedMetadata, AggregationConfidence};
pub use bridge::{CoordinateBridge, GeometryLocation, GeometrySelection};
pub use core::{
    AnchorStore, DocumentSnapshot, DocumentSource, RecoveryConfig, RecoveryOrchestrator,
    RecoveryReport, ReviewQueue,
};
pub use domain::{Anchor, CharRange, Chunk, EntityKind, RecoveryMethod, Span};
pub use error::AnchorError;
pub use matching::{MatchResult, MatcherConfig, TieredMatcher};

//! Core recovery logic.
//!
//! This module contains:
//! - RecoveryOrchestrator: batch recovery per document
//! - AnchorStore: atomic per-anchor persistence
//! - DocumentSource: fresh document snapshots
//! - RecoveryLog: append-only audit log
//! - ReviewQueue: accept / reject / relink of flagged anchors

pub mod anchor_store;
pub mod orchestrator;
pub mod recovery_log;
pub mod review;
pub mod snapshot;

// Re-export commonly used types
pub use anchor_store::{AnchorStore, JsonAnchorStore, MemoryAnchorStore};
pub use orchestrator::{
    AnchorOutcome, Outcome, RecoverOptions, RecoveryConfig, RecoveryOrchestrator, RecoveryReport,
    ReportCounts,
};
pub use recovery_log::{generate_recovery_key, hash_input, RecoveryLog};
pub use review::{ConfidenceBand, ReviewFilter, ReviewQueue};
pub use snapshot::{DocumentSnapshot, DocumentSource, MemoryDocumentSource, SnapshotDir};

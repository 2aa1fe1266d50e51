//! Engine error kinds.
//!
//! Only `InvariantViolation` is fatal for a recovery batch. The other kinds are
//! caught and classified per anchor by the orchestrator.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
pub enum AnchorError {
    /// Span is missing both location hints, or carries empty text
    #[error("Malformed span: {0}")]
    MalformedSpan(String),

    /// Document has zero chunks to search
    #[error("Document '{document_id}' has no chunks")]
    EmptyCandidateSet { document_id: String },

    /// Embedding service errored or timed out
    #[error("Embedding service unavailable: {0}")]
    EmbeddingServiceUnavailable(String),

    /// Chunk or span data breaks a structural invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Anchor not found: {0}")]
    AnchorNotFound(Uuid),

    #[error("Invalid range {start}..{end} for text of length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },
}

//! Adapter interfaces for external systems.
//!
//! The engine consumes embeddings from an opaque vector service; it never
//! generates them itself.

pub mod http_embedding;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use http_embedding::HttpEmbeddingClient;

/// Failure of an embedding call.
///
/// Every variant is treated as "semantic fallback unavailable".
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Embedding transport error: {0}")]
    Transport(String),

    /// Service answered with something other than a vector
    #[error("Embedding protocol error: {0}")]
    Protocol(String),

    #[error("Embedding has {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Human-readable service name
    fn name(&self) -> &str;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

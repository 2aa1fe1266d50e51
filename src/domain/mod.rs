//! Domain types for the anchoring engine.
//!
//! This module contains the core data structures:
//! - Span: captured text plus location hints
//! - Anchor: persisted annotation wrapping spans
//! - Chunk / Segmentation: externally produced text segments
//! - RecoveryEvent: audit records

pub mod anchor;
pub mod chunk;
pub mod events;
pub mod span;

// Re-export commonly used types
pub use anchor::{Anchor, AnchorStatus, EntityKind, RecoveryMethod};
pub use chunk::{Chunk, ChunkBox, ContentLabel, ContentLayer, Segmentation};
pub use events::{RecoveryEvent, RecoveryEventType};
pub use span::{CharRange, Rect, Span, SpanGeometry, DEFAULT_CONTEXT_CHARS};

//! Text matching: normalization, similarity primitives and the tiered
//! matcher that re-locates spans after content changes.
//!
//! - `text`: whitespace and typographic normalization with offset maps
//! - `similarity`: pure scorers (edit distance, trigrams, overlap, cosine)
//! - `index`: read-only normalized document snapshot and search scopes
//! - `tiers`: the strategy objects tried in order
//! - `matcher`: `TieredMatcher` and `MatchResult`

pub mod index;
pub mod matcher;
pub mod similarity;
pub mod text;
pub mod tiers;

pub use index::{DocumentIndex, Scope, ScopeKind};
pub use matcher::{AttemptStatus, MatchResult, MatcherConfig, TierAttempt, TieredMatcher};
pub use similarity::{
    bbox_overlap, cosine_similarity, edit_similarity, find_exact_matches, range_overlap,
};
pub use text::NormalizedText;
pub use tiers::{
    ChunkBoundedTier, ContextTier, ExactTier, Located, MatchTier, PreparedSpan, TierOutcome,
    TrigramTier,
};

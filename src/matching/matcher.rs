//! Tiered text matcher.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::index::{DocumentIndex, Scope, ScopeKind};
use super::tiers::{
    best_window, exact_in_scope, ChunkBoundedTier, ContextTier, ExactTier, Located, MatchTier,
    PreparedSpan, TierOutcome, TrigramTier,
};
use crate::domain::{CharRange, Chunk, RecoveryMethod, Span};
use crate::error::AnchorError;

/// Matcher thresholds and scope sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum context-window similarity, inclusive
    pub context_threshold: f64,
    /// Chars of context captured on each side of new spans
    pub context_chars: usize,
    /// Chunks kept by the trigram prefilter
    pub trigram_shortlist: usize,
    /// Neighbors searched around the origin chunk
    pub neighbor_chunks: usize,
    /// Neighbors forming the structural region when pages are unknown
    pub region_chunks: usize,
    pub fold_typography: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            context_threshold: 0.75,
            context_chars: crate::domain::DEFAULT_CONTEXT_CHARS,
            trigram_shortlist: 3,
            neighbor_chunks: 1,
            region_chunks: 3,
            fold_typography: false,
        }
    }
}

/// Status of one tier attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Accepted,
    Rejected,
    Skipped,
}

/// Diagnostic record of one tier attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAttempt {
    pub method: RecoveryMethod,
    pub status: AttemptStatus,
    pub best_score: Option<f64>,
    pub searched_chars: usize,
}

/// Outcome of matching one span. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub found: bool,
    pub char_range: Option<CharRange>,
    pub confidence: f64,
    pub method: RecoveryMethod,
    pub matched_chunk_id: Option<String>,
    /// Scope of the accepting tier
    pub scope: Option<ScopeKind>,
    /// Size of the accepting tier's search space, in normalized chars
    pub searched_chars: usize,
    pub attempts: Vec<TierAttempt>,
}

impl MatchResult {
    /// Result for a span no tier could place
    pub fn lost(attempts: Vec<TierAttempt>) -> Self {
        Self {
            found: false,
            char_range: None,
            confidence: 0.0,
            method: RecoveryMethod::Lost,
            matched_chunk_id: None,
            scope: None,
            searched_chars: 0,
            attempts,
        }
    }

    /// Best score any tier reached, for diagnostics
    pub fn best_score(&self) -> f64 {
        self.attempts
            .iter()
            .filter_map(|a| a.best_score)
            .fold(self.confidence, f64::max)
    }

    fn located(
        index: &DocumentIndex,
        method: RecoveryMethod,
        loc: Located,
        attempts: Vec<TierAttempt>,
    ) -> Self {
        let range = index.to_original_range(loc.start, loc.start + loc.len);
        let matched_chunk_id = index
            .chunk_at(range.start)
            .or_else(|| index.segmentation().overlapping(&range).first().copied())
            .map(|i| index.chunks()[i].id.clone());
        Self {
            found: true,
            char_range: Some(range),
            confidence: loc.confidence,
            method,
            matched_chunk_id,
            scope: Some(loc.scope),
            searched_chars: loc.searched_chars,
            attempts,
        }
    }
}

/// Runs tiers in order and stops at the first that accepts
pub struct TieredMatcher {
    tiers: Vec<Box<dyn MatchTier>>,
    config: MatcherConfig,
}

impl TieredMatcher {
    /// Default tier order: exact, context, chunk-bounded, trigram
    pub fn new(config: MatcherConfig) -> Self {
        let tiers: Vec<Box<dyn MatchTier>> = vec![
            Box::new(ExactTier {
                neighbor_chunks: config.neighbor_chunks,
            }),
            Box::new(ContextTier {
                threshold: config.context_threshold,
                neighbor_chunks: config.neighbor_chunks,
            }),
            Box::new(ChunkBoundedTier {
                threshold: config.context_threshold,
                neighbor_chunks: config.neighbor_chunks,
                region_chunks: config.region_chunks,
            }),
            Box::new(TrigramTier {
                threshold: config.context_threshold,
                shortlist: config.trigram_shortlist,
            }),
        ];
        Self { tiers, config }
    }

    /// Replace the tier list
    pub fn with_tiers(mut self, tiers: Vec<Box<dyn MatchTier>>) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Build a read-only index for `text` using this matcher's normalization
    pub fn index(&self, text: &str, chunks: Vec<Chunk>) -> Result<DocumentIndex, AnchorError> {
        DocumentIndex::new(text, chunks, self.config.fold_typography)
    }

    /// Locate `span` in a document given as text plus chunks.
    ///
    /// Validates the chunks; overlapping chunk ranges are an error.
    pub fn match_text(
        &self,
        span: &Span,
        candidate_text: &str,
        candidate_chunks: Vec<Chunk>,
    ) -> Result<MatchResult, AnchorError> {
        let index = self.index(candidate_text, candidate_chunks)?;
        Ok(self.match_span(span, &index))
    }

    /// Locate `span` in an already indexed document
    #[instrument(skip_all, fields(text_len = span.text.len()))]
    pub fn match_span(&self, span: &Span, index: &DocumentIndex) -> MatchResult {
        let prepared = PreparedSpan::new(span, index);
        if prepared.text.is_empty() {
            return MatchResult::lost(Vec::new());
        }

        let mut attempts = Vec::with_capacity(self.tiers.len());
        for tier in &self.tiers {
            let method = tier.method();
            match tier.attempt(&prepared, index) {
                TierOutcome::Accepted(loc) => {
                    debug!(%method, confidence = loc.confidence, searched = loc.searched_chars, "Tier accepted");
                    attempts.push(TierAttempt {
                        method,
                        status: AttemptStatus::Accepted,
                        best_score: Some(loc.confidence),
                        searched_chars: loc.searched_chars,
                    });
                    return MatchResult::located(index, method, loc, attempts);
                }
                TierOutcome::Rejected {
                    best_score,
                    searched_chars,
                } => {
                    debug!(%method, ?best_score, searched = searched_chars, "Tier rejected");
                    attempts.push(TierAttempt {
                        method,
                        status: AttemptStatus::Rejected,
                        best_score,
                        searched_chars,
                    });
                }
                TierOutcome::Skipped => {
                    debug!(%method, "Tier skipped");
                    attempts.push(TierAttempt {
                        method,
                        status: AttemptStatus::Skipped,
                        best_score: None,
                        searched_chars: 0,
                    });
                }
            }
        }

        MatchResult::lost(attempts)
    }

    /// Run only the exact and context strategies inside a caller-chosen scope
    pub fn match_in_scope(
        &self,
        span: &Span,
        index: &DocumentIndex,
        scope: &Scope,
        kind: ScopeKind,
    ) -> MatchResult {
        let prepared = PreparedSpan::new(span, index);
        let searched_chars = scope.total_len();
        let mut attempts = Vec::with_capacity(2);
        if prepared.text.is_empty() || scope.is_empty() {
            return MatchResult::lost(attempts);
        }

        if let Some((start, _)) = exact_in_scope(index, scope, &prepared) {
            attempts.push(TierAttempt {
                method: RecoveryMethod::Exact,
                status: AttemptStatus::Accepted,
                best_score: Some(1.0),
                searched_chars,
            });
            let loc = Located {
                start,
                len: prepared.text.len(),
                confidence: 1.0,
                scope: kind,
                searched_chars,
            };
            return MatchResult::located(index, RecoveryMethod::Exact, loc, attempts);
        }
        attempts.push(TierAttempt {
            method: RecoveryMethod::Exact,
            status: AttemptStatus::Rejected,
            best_score: None,
            searched_chars,
        });

        let hit = best_window(index.chars(), scope, &prepared);
        match hit {
            Some(hit) if hit.score >= self.config.context_threshold => {
                attempts.push(TierAttempt {
                    method: RecoveryMethod::Context,
                    status: AttemptStatus::Accepted,
                    best_score: Some(hit.score),
                    searched_chars,
                });
                let loc = Located {
                    start: hit.start,
                    len: hit.len,
                    confidence: hit.score,
                    scope: kind,
                    searched_chars,
                };
                MatchResult::located(index, RecoveryMethod::Context, loc, attempts)
            }
            other => {
                attempts.push(TierAttempt {
                    method: RecoveryMethod::Context,
                    status: AttemptStatus::Rejected,
                    best_score: other.map(|h| h.score),
                    searched_chars,
                });
                MatchResult::lost(attempts)
            }
        }
    }
}

impl Default for TieredMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

impl std::fmt::Debug for TieredMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredMatcher")
            .field("tiers", &self.tiers.iter().map(|t| t.method()).collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_exact() {
        let text = "Plato and the rhizome. Deleuze writes that the rhizome opposes hierarchy.";
        let chunks = vec![Chunk::new("c0", 0, 23), Chunk::new("c1", 23, text.chars().count())];
        let span = Span::capture(text, CharRange::new(47, 55), &chunks, 100).unwrap();
        assert_eq!(span.text, "rhizome ");
        assert_eq!(span.context_before, "Plato and the rhizome. Deleuze writes that the ");

        let result = TieredMatcher::default().match_text(&span, text, chunks).unwrap();
        assert!(result.found);
        assert_eq!(result.method, RecoveryMethod::Exact);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.char_range, Some(CharRange::new(47, 55)));
        assert_eq!(result.matched_chunk_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_lost_when_text_missing() {
        let text = "nothing relevant lives in this paragraph at all";
        let span = Span::from_range("quantum chromodynamics", "", "", CharRange::new(0, 22));
        let result = TieredMatcher::default()
            .match_text(&span, text, vec![Chunk::new("c0", 0, text.chars().count())])
            .unwrap();
        assert!(!result.found);
        assert_eq!(result.method, RecoveryMethod::Lost);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.attempts.len(), 4);
    }

    #[test]
    fn test_overlapping_chunks_are_fatal() {
        let span = Span::from_range("abc", "", "", CharRange::new(0, 3));
        let result = TieredMatcher::default().match_text(
            &span,
            "abcdef",
            vec![Chunk::new("a", 0, 4), Chunk::new("b", 3, 6)],
        );
        assert!(matches!(result, Err(AnchorError::InvariantViolation(_))));
    }

    #[test]
    fn test_custom_tier_order() {
        let text = "alpha beta gamma";
        let span = Span::from_range("beta", "alpha ", " gamma", CharRange::new(6, 10));
        let matcher = TieredMatcher::default().with_tiers(vec![Box::new(TrigramTier {
            threshold: 0.75,
            shortlist: 3,
        })]);
        let result = matcher
            .match_text(&span, text, vec![Chunk::new("c0", 0, 16)])
            .unwrap();
        assert_eq!(result.method, RecoveryMethod::Trigram);
        assert_eq!(result.char_range, Some(CharRange::new(6, 10)));
    }
}

//! Match tiers: ordered strategies of decreasing precision and increasing
//! search scope.
//!
//! Each tier implements [`MatchTier`] and either accepts a location,
//! rejects with its best score, or is skipped when the span carries no hint
//! it can use. Ties are always broken by higher score, then lower chunk
//! index, then smaller offset.

use std::cmp::Ordering;

use tracing::debug;

use super::index::{DocumentIndex, Scope, ScopeKind};
use super::similarity::{edit_similarity, find_exact_matches, jaccard, trigrams};
use crate::domain::{CharRange, RecoveryMethod, Span};

/// Span text and hints, normalized against one document
#[derive(Debug, Clone)]
pub struct PreparedSpan {
    pub text: Vec<char>,
    pub before: Vec<char>,
    pub after: Vec<char>,
    /// `before + text + after`
    pub query: Vec<char>,
    /// Index of the origin chunk in the current segmentation
    pub origin_chunk: Option<usize>,
    pub origin_pages: Option<(u32, u32)>,
    pub origin_range: Option<CharRange>,
}

impl PreparedSpan {
    pub fn new(span: &Span, index: &DocumentIndex) -> Self {
        let text = index.prepare(&span.text);
        let before = index.prepare(&span.context_before);
        let after = index.prepare(&span.context_after);

        let mut query = Vec::with_capacity(before.len() + text.len() + after.len());
        query.extend_from_slice(&before);
        query.extend_from_slice(&text);
        query.extend_from_slice(&after);

        let origin_chunk = span
            .origin_chunk_id
            .as_deref()
            .and_then(|id| index.segmentation().position(id));

        let origin_pages = span
            .origin_geometry
            .as_ref()
            .map(|g| (g.page, g.page))
            .or_else(|| origin_chunk.and_then(|i| index.chunks()[i].pages()));

        Self {
            text,
            before,
            after,
            query,
            origin_chunk,
            origin_pages,
            origin_range: span.origin_char_range,
        }
    }

    /// Chunk indices around the span's own origin: the origin chunk, chunks
    /// overlapping the original range, and `neighbors` on each side.
    pub(crate) fn origin_chunks(&self, index: &DocumentIndex, neighbors: usize) -> Vec<usize> {
        let count = index.chunks().len();
        let mut seeds: Vec<usize> = Vec::new();
        seeds.extend(self.origin_chunk);
        if let Some(range) = self.origin_range {
            seeds.extend(index.segmentation().overlapping(&range));
        }
        if seeds.is_empty() {
            if let Some((start, end)) = self.origin_pages {
                seeds.extend(
                    index
                        .chunks()
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| c.intersects_pages(start, end))
                        .map(|(i, _)| i),
                );
                return seeds;
            }
        }
        with_neighbors(&seeds, neighbors, count)
    }
}

fn with_neighbors(seeds: &[usize], neighbors: usize, count: usize) -> Vec<usize> {
    let mut out: Vec<usize> = seeds
        .iter()
        .flat_map(|i| i.saturating_sub(neighbors)..=(i + neighbors).min(count.saturating_sub(1)))
        .filter(|i| *i < count)
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// A location in normalized coordinates accepted by a tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    pub start: usize,
    pub len: usize,
    pub confidence: f64,
    pub scope: ScopeKind,
    pub searched_chars: usize,
}

/// Result of one tier attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    Accepted(Located),
    Rejected {
        best_score: Option<f64>,
        searched_chars: usize,
    },
    /// The span carries no hint this tier can use
    Skipped,
}

/// Common contract of all tiers
pub trait MatchTier: Send + Sync {
    /// Method tag reported when this tier accepts
    fn method(&self) -> RecoveryMethod;

    fn attempt(&self, span: &PreparedSpan, index: &DocumentIndex) -> TierOutcome;
}

/// Best window found by the sliding search
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WindowHit {
    pub start: usize,
    pub len: usize,
    pub score: f64,
}

/// Higher score first, then smaller offset
fn better(a: &WindowHit, b: &WindowHit) -> bool {
    match a.score.total_cmp(&b.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => a.start < b.start,
    }
}

/// Similarity of the window `[start, start + len)` plus its surroundings
/// against `before + text + after`
pub(crate) fn context_score(doc: &[char], start: usize, len: usize, span: &PreparedSpan) -> f64 {
    let n = doc.len();
    let start = start.min(n);
    let end = (start + len).min(n);
    let lo = start.saturating_sub(span.before.len());
    let hi = (end + span.after.len()).min(n);
    edit_similarity(&doc[lo..hi], &span.query)
}

/// All occurrences of the span text inside `scope`, best context first.
///
/// Returns `(start, context_score)` of the preferred occurrence.
pub(crate) fn exact_in_scope(
    index: &DocumentIndex,
    scope: &Scope,
    span: &PreparedSpan,
) -> Option<(usize, f64)> {
    let doc = index.chars();
    let m = span.text.len();
    let mut best: Option<WindowHit> = None;

    for (s, e) in scope.windows() {
        for offset in find_exact_matches(&doc[*s..*e], &span.text) {
            let start = s + offset;
            let hit = WindowHit {
                start,
                len: m,
                score: context_score(doc, start, m, span),
            };
            if best.as_ref().map_or(true, |b| better(&hit, b)) {
                best = Some(hit);
            }
        }
    }

    best.map(|hit| (hit.start, hit.score))
}

/// Coarse-to-fine sliding window search for the best context match
pub(crate) fn best_window(doc: &[char], scope: &Scope, span: &PreparedSpan) -> Option<WindowHit> {
    let m = span.text.len();
    if m == 0 || doc.is_empty() {
        return None;
    }
    let step = (m / 20).clamp(1, 10);

    // Top three coarse hits, each with its window bounds
    let mut coarse: Vec<(WindowHit, usize, usize)> = Vec::new();
    for (s, e) in scope.windows() {
        let last = last_position(*s, *e, m);
        let mut p = *s;
        loop {
            let hit = WindowHit {
                start: p,
                len: m,
                score: context_score(doc, p, m, span),
            };
            coarse.push((hit, *s, last));
            if p >= last {
                break;
            }
            p = (p + step).min(last);
        }
    }
    coarse.sort_by(|a, b| {
        b.0.score
            .total_cmp(&a.0.score)
            .then(a.0.start.cmp(&b.0.start))
    });
    coarse.truncate(3);

    let mut best: Option<WindowHit> = None;
    for (hit, lo, hi) in coarse {
        let from = hit.start.saturating_sub(step).max(lo);
        let to = (hit.start + step).min(hi);
        for p in from..=to {
            let candidate = if p == hit.start {
                hit
            } else {
                WindowHit {
                    start: p,
                    len: m,
                    score: context_score(doc, p, m, span),
                }
            };
            if best.as_ref().map_or(true, |b| better(&candidate, b)) {
                best = Some(candidate);
            }
        }
    }

    best.map(|hit| refine_boundaries(doc, hit, span))
}

fn last_position(start: usize, end: usize, m: usize) -> usize {
    if end >= start + m {
        end - m
    } else {
        start
    }
}

/// Adjust start and length within about 10% of the span length so the
/// window's text is as close as possible to the span text.
///
/// Uses a free-start alignment of the span text against the neighborhood of
/// the hit. Ties prefer the smallest shift, then the smallest length change.
fn refine_boundaries(doc: &[char], hit: WindowHit, span: &PreparedSpan) -> WindowHit {
    let m = span.text.len();
    let radius = (m / 10).max(1);
    let lo = hit.start.saturating_sub(radius);
    let hi = (hit.start + m + radius).min(doc.len());
    if hi <= lo {
        return hit;
    }
    let region = &doc[lo..hi];
    let width = region.len();

    // dist[j] / origin[j]: best distance and start for a match ending at lo + j
    let mut dist: Vec<usize> = vec![0; width + 1];
    let mut origin: Vec<usize> = (0..=width).collect();
    let mut next_dist = vec![0; width + 1];
    let mut next_origin = vec![0; width + 1];

    for (i, pc) in span.text.iter().enumerate() {
        next_dist[0] = i + 1;
        next_origin[0] = 0;
        for j in 1..=width {
            let diag = dist[j - 1] + usize::from(region[j - 1] != *pc);
            let up = dist[j] + 1;
            let left = next_dist[j - 1] + 1;
            if diag <= up && diag <= left {
                next_dist[j] = diag;
                next_origin[j] = origin[j - 1];
            } else if up <= left {
                next_dist[j] = up;
                next_origin[j] = origin[j];
            } else {
                next_dist[j] = left;
                next_origin[j] = next_origin[j - 1];
            }
        }
        std::mem::swap(&mut dist, &mut next_dist);
        std::mem::swap(&mut origin, &mut next_origin);
    }

    let mut chosen: Option<(usize, usize, usize, usize, usize)> = None;
    for j in 1..=width {
        let start = lo + origin[j];
        let end = lo + j;
        if end <= start {
            continue;
        }
        let len = end - start;
        let shift = start.abs_diff(hit.start);
        let stretch = len.abs_diff(m);
        if shift > radius || stretch > radius {
            continue;
        }
        let key = (dist[j], shift, stretch, start, len);
        if chosen.map_or(true, |c| key < c) {
            chosen = Some(key);
        }
    }

    match chosen {
        Some((_, _, _, start, len)) if (start, len) != (hit.start, hit.len) => {
            // Confidence always describes the window that is returned
            let score = context_score(doc, start, len, span);
            if score >= hit.score {
                WindowHit { start, len, score }
            } else {
                hit
            }
        }
        _ => hit,
    }
}

/// Exact substring search, narrowest scope first
#[derive(Debug, Clone)]
pub struct ExactTier {
    pub neighbor_chunks: usize,
}

impl ExactTier {
    fn stages(&self, span: &PreparedSpan, index: &DocumentIndex) -> Vec<(Scope, ScopeKind)> {
        let mut stages = Vec::new();
        if let Some(narrow) = span
            .origin_chunk
            .and_then(|i| index.chunks()[i].narrow_char_span())
        {
            stages.push((Scope::from_ranges(index, &[narrow]), ScopeKind::CharSpan));
        }
        let origin = span.origin_chunks(index, self.neighbor_chunks);
        if !origin.is_empty() {
            stages.push((Scope::from_chunks(index, &origin), ScopeKind::Origin));
        }
        stages.push((Scope::whole(index), ScopeKind::Document));
        stages
    }
}

impl MatchTier for ExactTier {
    fn method(&self) -> RecoveryMethod {
        RecoveryMethod::Exact
    }

    fn attempt(&self, span: &PreparedSpan, index: &DocumentIndex) -> TierOutcome {
        let mut searched = 0;
        for (scope, kind) in self.stages(span, index) {
            searched = scope.total_len();
            if let Some((start, context)) = exact_in_scope(index, &scope, span) {
                debug!(?kind, start, context, "Exact match");
                return TierOutcome::Accepted(Located {
                    start,
                    len: span.text.len(),
                    confidence: 1.0,
                    scope: kind,
                    searched_chars: searched,
                });
            }
        }
        TierOutcome::Rejected {
            best_score: None,
            searched_chars: searched,
        }
    }
}

fn window_outcome(
    index: &DocumentIndex,
    scope: &Scope,
    kind: ScopeKind,
    span: &PreparedSpan,
    threshold: f64,
) -> TierOutcome {
    let searched_chars = scope.total_len();
    match best_window(index.chars(), scope, span) {
        Some(hit) if hit.score >= threshold => TierOutcome::Accepted(Located {
            start: hit.start,
            len: hit.len,
            confidence: hit.score,
            scope: kind,
            searched_chars,
        }),
        best => TierOutcome::Rejected {
            best_score: best.map(|h| h.score),
            searched_chars,
        },
    }
}

/// Context-window scoring restricted to the span's own origin
#[derive(Debug, Clone)]
pub struct ContextTier {
    pub threshold: f64,
    pub neighbor_chunks: usize,
}

impl MatchTier for ContextTier {
    fn method(&self) -> RecoveryMethod {
        RecoveryMethod::Context
    }

    fn attempt(&self, span: &PreparedSpan, index: &DocumentIndex) -> TierOutcome {
        let chunks = span.origin_chunks(index, self.neighbor_chunks);
        if chunks.is_empty() {
            return TierOutcome::Skipped;
        }
        let scope = Scope::from_chunks(index, &chunks);
        window_outcome(index, &scope, ScopeKind::Origin, span, self.threshold)
    }
}

/// Context-window scoring over the origin chunk's page or structural region.
///
/// Applies only when an origin chunk or page is known.
#[derive(Debug, Clone)]
pub struct ChunkBoundedTier {
    pub threshold: f64,
    pub neighbor_chunks: usize,
    pub region_chunks: usize,
}

impl ChunkBoundedTier {
    fn region(&self, span: &PreparedSpan, index: &DocumentIndex) -> Vec<usize> {
        let count = index.chunks().len();
        let mut region: Vec<usize> = Vec::new();
        if let Some((start, end)) = span.origin_pages {
            region.extend(
                index
                    .chunks()
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.intersects_pages(start, end))
                    .map(|(i, _)| i),
            );
        }
        if let Some(origin) = span.origin_chunk {
            region.extend(with_neighbors(&[origin], self.region_chunks, count));
        }
        region.sort_unstable();
        region.dedup();
        region
    }
}

impl MatchTier for ChunkBoundedTier {
    fn method(&self) -> RecoveryMethod {
        RecoveryMethod::ChunkBounded
    }

    fn attempt(&self, span: &PreparedSpan, index: &DocumentIndex) -> TierOutcome {
        if span.origin_chunk.is_none() && span.origin_pages.is_none() {
            return TierOutcome::Skipped;
        }
        let region = self.region(span, index);
        let scope = Scope::from_chunks(index, &region);
        // Nothing beyond what the context tier already searched
        if scope.is_empty()
            || scope == Scope::from_chunks(index, &span.origin_chunks(index, self.neighbor_chunks))
        {
            return TierOutcome::Skipped;
        }
        window_outcome(index, &scope, ScopeKind::Region, span, self.threshold)
    }
}

/// Trigram shortlist over all chunks, then context-window scoring
#[derive(Debug, Clone)]
pub struct TrigramTier {
    pub threshold: f64,
    pub shortlist: usize,
}

impl TrigramTier {
    pub(crate) fn shortlist(&self, span: &PreparedSpan, index: &DocumentIndex) -> Vec<usize> {
        let query = trigrams(&span.query);
        let mut scored: Vec<(usize, f64)> = (0..index.chunks().len())
            .filter_map(|i| index.chunk_trigrams(i).map(|t| (i, jaccard(&query, t))))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(self.shortlist.max(1));
        let mut picked: Vec<usize> = scored.into_iter().map(|(i, _)| i).collect();
        picked.sort_unstable();
        picked
    }
}

impl MatchTier for TrigramTier {
    fn method(&self) -> RecoveryMethod {
        RecoveryMethod::Trigram
    }

    fn attempt(&self, span: &PreparedSpan, index: &DocumentIndex) -> TierOutcome {
        let picked = self.shortlist(span, index);
        if picked.is_empty() {
            return TierOutcome::Rejected {
                best_score: None,
                searched_chars: 0,
            };
        }
        // Expanded so spans straddling a chunk boundary stay reachable
        let scope = Scope::from_chunks(index, &picked).expanded(span.text.len(), index.chars().len());
        window_outcome(index, &scope, ScopeKind::Shortlist, span, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Chunk;

    fn index(text: &str, chunks: Vec<Chunk>) -> DocumentIndex {
        DocumentIndex::new(text, chunks, false).unwrap()
    }

    fn prepared(index: &DocumentIndex, span: &Span) -> PreparedSpan {
        PreparedSpan::new(span, index)
    }

    #[test]
    fn test_exact_prefers_matching_context() {
        let text = "red apple here. green apple there.";
        let idx = index(text, vec![Chunk::new("c0", 0, text.chars().count())]);
        let span = Span::from_range("apple", "green ", " there", CharRange::new(22, 27));
        let outcome = ExactTier { neighbor_chunks: 1 }.attempt(&prepared(&idx, &span), &idx);
        match outcome {
            TierOutcome::Accepted(loc) => {
                assert_eq!(loc.start, 22);
                assert_eq!(loc.confidence, 1.0);
            }
            other => panic!("expected exact hit, got {:?}", other),
        }
    }

    #[test]
    fn test_exact_uses_char_span_window() {
        let text = "x".repeat(500) + "needle" + &"y".repeat(394);
        let idx = index(
            &text,
            vec![Chunk::new("c0", 0, 400), Chunk::new("c1", 400, 900).with_char_span(500, 700)],
        );
        let span = Span::from_range("needle", "", "", CharRange::new(500, 506)).with_origin_chunk("c1");
        match (ExactTier { neighbor_chunks: 1 }).attempt(&prepared(&idx, &span), &idx) {
            TierOutcome::Accepted(loc) => {
                assert_eq!(loc.scope, ScopeKind::CharSpan);
                assert_eq!(loc.searched_chars, 200);
            }
            other => panic!("expected exact hit, got {:?}", other),
        }
    }

    #[test]
    fn test_context_threshold_is_inclusive() {
        let text = "abcdefghijklmnoVWXYZ";
        let idx = index(text, vec![Chunk::new("c0", 0, 20)]);
        let span = Span::from_range("abcdefghijklmnopqrst", "", "", CharRange::new(0, 20));
        let p = prepared(&idx, &span);

        let accepted = ContextTier { threshold: 0.75, neighbor_chunks: 1 }.attempt(&p, &idx);
        assert!(matches!(accepted, TierOutcome::Accepted(loc) if loc.confidence == 0.75));

        let rejected = ContextTier { threshold: 0.7501, neighbor_chunks: 1 }.attempt(&p, &idx);
        assert!(matches!(rejected, TierOutcome::Rejected { best_score: Some(s), .. } if s == 0.75));
    }

    #[test]
    fn test_context_skipped_without_hints() {
        let idx = index("some text", vec![Chunk::new("c0", 0, 9)]);
        let span = Span::from_range("text", "", "", CharRange::new(50, 54));
        let outcome = ContextTier { threshold: 0.75, neighbor_chunks: 1 }.attempt(&prepared(&idx, &span), &idx);
        assert_eq!(outcome, TierOutcome::Skipped);
    }

    #[test]
    fn test_chunk_bounded_requires_origin() {
        let idx = index("some text", vec![Chunk::new("c0", 0, 9)]);
        let span = Span::from_range("text", "", "", CharRange::new(5, 9));
        let tier = ChunkBoundedTier { threshold: 0.75, neighbor_chunks: 1, region_chunks: 3 };
        assert_eq!(tier.attempt(&prepared(&idx, &span), &idx), TierOutcome::Skipped);
    }

    #[test]
    fn test_refinement_tracks_length_change() {
        let text = "the quick brown fox jumps over the lazy dog";
        let idx = index(text, vec![Chunk::new("c0", 0, text.chars().count())]);
        // "brown fox jumps" with a dropped char
        let span = Span::from_range("brown fx jumps", "the quick ", " over the", CharRange::new(10, 25));
        let p = prepared(&idx, &span);
        let hit = best_window(idx.chars(), &Scope::whole(&idx), &p).unwrap();
        assert_eq!(idx.to_original_range(hit.start, hit.start + hit.len), CharRange::new(10, 25));
    }

    #[test]
    fn test_window_score_belongs_to_returned_range() {
        let text = "the quick brown fox jumps over the lazy dog";
        let idx = index(text, vec![Chunk::new("c0", 0, text.chars().count())]);
        for span in [
            Span::from_range("brown fx jumps", "the quick ", " over the", CharRange::new(10, 25)),
            Span::from_range("quick brown foxes jump", "", "", CharRange::new(4, 25)),
            Span::from_range("lazy dg", "over the ", "", CharRange::new(35, 43)),
        ] {
            let p = prepared(&idx, &span);
            let hit = best_window(idx.chars(), &Scope::whole(&idx), &p).unwrap();
            let rescored = context_score(idx.chars(), hit.start, hit.len, &p);
            assert!((hit.score - rescored).abs() < 1e-12, "{:?}", span.text);
        }
    }

    #[test]
    fn test_trigram_shortlist_orders_by_similarity() {
        let text = "zzzz zzzz zzzz. the rhizome opposes. qqqq qqqq qqqq.";
        let idx = index(
            text,
            vec![Chunk::new("a", 0, 15), Chunk::new("b", 15, 36), Chunk::new("c", 36, 52)],
        );
        let span = Span::from_range("rhizome opposes", "", "", CharRange::new(0, 1));
        let tier = TrigramTier { threshold: 0.75, shortlist: 1 };
        assert_eq!(tier.shortlist(&prepared(&idx, &span), &idx), vec![1]);
    }
}

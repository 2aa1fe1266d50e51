//! Read-only snapshot of a document prepared for matching.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use super::similarity::{trigrams, Trigram};
use super::text::{normalize_chars, NormalizedText};
use crate::domain::{CharRange, Chunk, Segmentation};
use crate::error::AnchorError;

/// Normalized document text plus its validated segmentation.
///
/// Built once per recovery batch and shared read-only across workers.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    text: NormalizedText,
    segmentation: Segmentation,
    /// Normalized `(start, end)` of each chunk
    chunk_windows: Vec<(usize, usize)>,
    chunk_trigrams: Vec<HashSet<Trigram>>,
    fold: bool,
    fingerprint: String,
}

impl DocumentIndex {
    /// Validate `chunks` against `text` and prepare the normalized view.
    ///
    /// Fails with `InvariantViolation` when the chunks do not form a valid
    /// segmentation of the text.
    pub fn new(text: &str, chunks: Vec<Chunk>, fold: bool) -> Result<Self, AnchorError> {
        let normalized = NormalizedText::new(text, fold);
        let segmentation = Segmentation::new(chunks, Some(normalized.original_len()))?;

        let chunk_windows: Vec<(usize, usize)> = segmentation
            .chunks()
            .iter()
            .map(|c| normalized.to_normalized_range(&c.range()))
            .collect();
        let chunk_trigrams = chunk_windows
            .iter()
            .map(|(s, e)| trigrams(&normalized.chars()[*s..*e]))
            .collect();

        let fingerprint = fingerprint(text, segmentation.chunks());

        Ok(Self {
            text: normalized,
            segmentation,
            chunk_windows,
            chunk_trigrams,
            fold,
            fingerprint,
        })
    }

    pub fn chars(&self) -> &[char] {
        self.text.chars()
    }

    pub fn normalized(&self) -> &NormalizedText {
        &self.text
    }

    pub fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.segmentation.chunks()
    }

    pub fn is_empty(&self) -> bool {
        self.segmentation.is_empty()
    }

    /// Stable digest of the text and chunk boundaries
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn original_len(&self) -> usize {
        self.text.original_len()
    }

    pub(crate) fn chunk_window(&self, idx: usize) -> Option<(usize, usize)> {
        self.chunk_windows.get(idx).copied()
    }

    pub(crate) fn chunk_trigrams(&self, idx: usize) -> Option<&HashSet<Trigram>> {
        self.chunk_trigrams.get(idx)
    }

    /// Normalize a query the same way the document was normalized
    pub fn prepare(&self, text: &str) -> Vec<char> {
        normalize_chars(text, self.fold)
    }

    pub fn to_original_range(&self, start: usize, end: usize) -> CharRange {
        self.text.to_original_range(start, end)
    }

    pub fn to_normalized_range(&self, range: &CharRange) -> (usize, usize) {
        self.text.to_normalized_range(range)
    }

    /// Index of the chunk holding the original char at `offset`
    pub fn chunk_at(&self, offset: usize) -> Option<usize> {
        self.segmentation.chunk_at(offset)
    }

    /// Chunk ids intersecting an original range, in order
    pub fn chunk_ids_for(&self, range: &CharRange) -> Vec<String> {
        self.segmentation
            .overlapping(range)
            .into_iter()
            .map(|i| self.chunks()[i].id.clone())
            .collect()
    }
}

/// sha256 over the text and chunk boundaries, first 16 hex chars
fn fingerprint(text: &str, chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    for chunk in chunks {
        hasher.update(format!("\n{}:{}:{}", chunk.id, chunk.char_start, chunk.char_end).as_bytes());
    }
    hex::encode(&hasher.finalize()[..8])
}

/// Where a search scope came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Precise char_span window of a chunk
    CharSpan,
    /// Origin chunk and its immediate neighbors
    Origin,
    /// Chunks on the origin page or structural region
    Region,
    /// Chunks on a given page
    Page,
    /// Trigram shortlist
    Shortlist,
    Document,
}

/// Sorted, merged set of normalized windows to search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    windows: Vec<(usize, usize)>,
}

impl Scope {
    /// Build from arbitrary windows; empty ones are dropped, overlapping or
    /// touching ones merged.
    pub fn from_windows(mut windows: Vec<(usize, usize)>) -> Self {
        windows.retain(|(s, e)| e > s);
        windows.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(windows.len());
        for (s, e) in windows {
            match merged.last_mut() {
                Some(last) if s <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }
        Self { windows: merged }
    }

    pub fn whole(index: &DocumentIndex) -> Self {
        Self::from_windows(vec![(0, index.chars().len())])
    }

    /// Scope covering the given chunk indices
    pub fn from_chunks(index: &DocumentIndex, chunk_indices: &[usize]) -> Self {
        Self::from_windows(
            chunk_indices
                .iter()
                .filter_map(|i| index.chunk_window(*i))
                .collect(),
        )
    }

    /// Scope covering original char ranges
    pub fn from_ranges(index: &DocumentIndex, ranges: &[CharRange]) -> Self {
        Self::from_windows(ranges.iter().map(|r| index.to_normalized_range(r)).collect())
    }

    /// Grow every window by `by` chars on both sides, clamped to `limit`
    pub fn expanded(&self, by: usize, limit: usize) -> Self {
        Self::from_windows(
            self.windows
                .iter()
                .map(|(s, e)| (s.saturating_sub(by), (e + by).min(limit)))
                .collect(),
        )
    }

    pub fn windows(&self) -> &[(usize, usize)] {
        &self.windows
    }

    /// Number of chars searched
    pub fn total_len(&self) -> usize {
        self.windows.iter().map(|(s, e)| e - s).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_maps_chunks_to_normalized_windows() {
        let index = DocumentIndex::new(
            "alpha   beta gamma",
            vec![Chunk::new("a", 0, 8), Chunk::new("b", 8, 18)],
            false,
        )
        .unwrap();
        assert_eq!(index.chars().len(), 16);
        assert_eq!(index.chunk_window(0), Some((0, 6)));
        assert_eq!(index.chunk_window(1), Some((6, 16)));
    }

    #[test]
    fn test_index_rejects_chunks_past_text() {
        let result = DocumentIndex::new("short", vec![Chunk::new("a", 0, 10)], false);
        assert!(matches!(result, Err(AnchorError::InvariantViolation(_))));
    }

    #[test]
    fn test_fingerprint_tracks_boundaries() {
        let a = DocumentIndex::new("abcdef", vec![Chunk::new("a", 0, 3), Chunk::new("b", 3, 6)], false).unwrap();
        let b = DocumentIndex::new("abcdef", vec![Chunk::new("a", 0, 4), Chunk::new("b", 4, 6)], false).unwrap();
        let c = DocumentIndex::new("abcdef", vec![Chunk::new("a", 0, 3), Chunk::new("b", 3, 6)], false).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn test_scope_merges_windows() {
        let scope = Scope::from_windows(vec![(10, 20), (0, 5), (18, 30), (5, 5), (30, 32)]);
        assert_eq!(scope.windows(), &[(0, 5), (10, 32)]);
        assert_eq!(scope.total_len(), 27);
    }

    #[test]
    fn test_scope_expanded_clamps() {
        let scope = Scope::from_windows(vec![(2, 4)]).expanded(5, 8);
        assert_eq!(scope.windows(), &[(0, 8)]);
    }
}

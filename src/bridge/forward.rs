//! Paginated selection to flat-text offsets.
//!
//! Locates the selected text by identity, using geometric hints only to
//! narrow where the matcher looks first.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::reverse::{to_geometry, GeometryLocation};
use crate::domain::{CharRange, Rect, Span, SpanGeometry};
use crate::matching::{bbox_overlap, DocumentIndex, MatchResult, Scope, ScopeKind, TieredMatcher};

/// A selection made in the paginated representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySelection {
    pub text: String,
    #[serde(default)]
    pub rects: Vec<Rect>,
    #[serde(default)]
    pub context_before: String,
    #[serde(default)]
    pub context_after: String,
}

impl GeometrySelection {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rects: Vec::new(),
            context_before: String::new(),
            context_after: String::new(),
        }
    }

    pub fn with_rects(mut self, rects: Vec<Rect>) -> Self {
        self.rects = rects;
        self
    }

    pub fn with_context(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.context_before = before.into();
        self.context_after = after.into();
        self
    }

    /// Span describing this selection on `page`
    pub fn to_span(&self, page: u32) -> Span {
        Span::from_geometry(
            self.text.clone(),
            SpanGeometry {
                page,
                rects: self.rects.clone(),
            },
        )
        .with_context(self.context_before.clone(), self.context_after.clone())
    }
}

/// Maps between paginated coordinates and flat-text offsets for one
/// document snapshot
pub struct CoordinateBridge<'a> {
    matcher: &'a TieredMatcher,
    index: &'a DocumentIndex,
}

impl<'a> CoordinateBridge<'a> {
    pub fn new(matcher: &'a TieredMatcher, index: &'a DocumentIndex) -> Self {
        Self { matcher, index }
    }

    /// Locate a paginated selection in the flat text
    pub fn to_flat_offset(&self, selection: &GeometrySelection, page: u32) -> MatchResult {
        self.locate_span(&selection.to_span(page), page)
    }

    /// Locate a span whose only location hint is geometric.
    ///
    /// Tries, in order: each precise `char_span` window on the page (best
    /// box overlap first), all chunks on the page, then the whole document.
    #[instrument(skip(self, span))]
    pub fn locate_span(&self, span: &Span, page: u32) -> MatchResult {
        let mut attempts = Vec::new();
        let rects: &[Rect] = span
            .origin_geometry
            .as_ref()
            .map(|g| g.rects.as_slice())
            .unwrap_or(&[]);

        for (chunk_idx, window) in self.char_span_windows(page, rects) {
            let scope = Scope::from_ranges(self.index, &[window]);
            let mut result = self
                .matcher
                .match_in_scope(span, self.index, &scope, ScopeKind::CharSpan);
            if result.found {
                debug!(chunk = %self.index.chunks()[chunk_idx].id, "Located inside char_span window");
                attempts.append(&mut result.attempts);
                result.attempts = attempts;
                return result;
            }
            attempts.append(&mut result.attempts);
        }

        let page_chunks: Vec<usize> = self
            .index
            .chunks()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.covers_page(page))
            .map(|(i, _)| i)
            .collect();
        if !page_chunks.is_empty() {
            let scope = Scope::from_chunks(self.index, &page_chunks);
            let mut result = self
                .matcher
                .match_in_scope(span, self.index, &scope, ScopeKind::Page);
            attempts.append(&mut result.attempts);
            if result.found {
                debug!(page, "Located on page");
                result.attempts = attempts;
                return result;
            }
        }

        let mut result = self.matcher.match_span(span, self.index);
        attempts.append(&mut result.attempts);
        result.attempts = attempts;
        result
    }

    /// Precise windows on `page`, ordered by overlap between the chunk's
    /// boxes and the selection, then chunk order
    fn char_span_windows(&self, page: u32, rects: &[Rect]) -> Vec<(usize, CharRange)> {
        let mut windows: Vec<(usize, CharRange, f64)> = self
            .index
            .chunks()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.covers_page(page))
            .filter_map(|(i, c)| {
                let window = c.narrow_char_span()?;
                let overlap = c
                    .bboxes_on_page(page)
                    .flat_map(|b| rects.iter().map(move |r| bbox_overlap(&b.to_rect(), r)))
                    .fold(0.0, f64::max);
                Some((i, window, overlap))
            })
            .collect();
        windows.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));
        windows.into_iter().map(|(i, w, _)| (i, w)).collect()
    }

    /// Paginated location of a flat-text range
    pub fn to_geometry(&self, range: &CharRange) -> GeometryLocation {
        to_geometry(range, self.index.chunks())
    }
}

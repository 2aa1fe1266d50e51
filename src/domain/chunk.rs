//! Chunks and segmentations of the flat text.
//!
//! Chunks are produced upstream. A segmentation is one complete,
//! non-overlapping partition of a document; two segmentations of the same
//! document may disagree on boundaries.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::span::{CharRange, Rect};
use crate::error::AnchorError;

/// Bounding box of chunk content on a page.
///
/// Extractors disagree on the vertical origin, so `t` may be greater than `b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkBox {
    pub page: u32,
    pub l: f64,
    pub t: f64,
    pub r: f64,
    pub b: f64,
}

impl ChunkBox {
    pub fn top(&self) -> f64 {
        self.t.min(self.b)
    }

    pub fn bottom(&self) -> f64 {
        self.t.max(self.b)
    }

    pub fn left(&self) -> f64 {
        self.l.min(self.r)
    }

    pub fn right(&self) -> f64 {
        self.l.max(self.r)
    }

    pub fn height(&self) -> f64 {
        self.bottom() - self.top()
    }

    /// Same box as a top-left anchored rectangle
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.left(), self.top(), self.right() - self.left(), self.height())
    }
}

/// Layer a chunk's content belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentLayer {
    /// Main body text
    Body,
    /// Headers, footers, page numbers and other boilerplate
    Furniture,
    Background,
    Invisible,
    Notes,
}

/// Structural role of a chunk's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentLabel {
    Text,
    Paragraph,
    Title,
    SectionHeader,
    ListItem,
    Code,
    Table,
    Picture,
    Caption,
    Footnote,
    Formula,
    PageHeader,
    PageFooter,
    Reference,
}

/// An externally produced segment of the flat text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub char_start: usize,
    pub char_end: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_start: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_end: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bboxes: Vec<ChunkBox>,

    /// Narrow, high-precision range hint from the extractor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_span: Option<CharRange>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_layer: Option<ContentLayer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_label: Option<ContentLabel>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub heading_path: Vec<String>,
}

impl Chunk {
    /// Create a chunk with no optional metadata
    pub fn new(id: impl Into<String>, char_start: usize, char_end: usize) -> Self {
        Self {
            id: id.into(),
            char_start,
            char_end,
            page_start: None,
            page_end: None,
            bboxes: Vec::new(),
            char_span: None,
            content_layer: None,
            content_label: None,
            heading_path: Vec::new(),
        }
    }

    pub fn with_pages(mut self, start: u32, end: u32) -> Self {
        self.page_start = Some(start);
        self.page_end = Some(end);
        self
    }

    pub fn with_char_span(mut self, start: usize, end: usize) -> Self {
        self.char_span = Some(CharRange::new(start, end));
        self
    }

    pub fn with_label(mut self, label: ContentLabel) -> Self {
        self.content_label = Some(label);
        self
    }

    pub fn with_layer(mut self, layer: ContentLayer) -> Self {
        self.content_layer = Some(layer);
        self
    }

    pub fn with_headings<I, S>(mut self, headings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.heading_path = headings.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_bboxes(mut self, bboxes: Vec<ChunkBox>) -> Self {
        self.bboxes = bboxes;
        self
    }

    pub fn range(&self) -> CharRange {
        CharRange::new(self.char_start, self.char_end)
    }

    pub fn len(&self) -> usize {
        self.range().len()
    }

    pub fn is_empty(&self) -> bool {
        self.range().is_empty()
    }

    /// Declared page range, if any page is known
    pub fn pages(&self) -> Option<(u32, u32)> {
        match (self.page_start, self.page_end) {
            (Some(s), Some(e)) => Some((s.min(e), s.max(e))),
            (Some(p), None) | (None, Some(p)) => Some((p, p)),
            (None, None) => None,
        }
    }

    pub fn covers_page(&self, page: u32) -> bool {
        self.pages().is_some_and(|(s, e)| page >= s && page <= e)
    }

    /// Whether the declared page range intersects `[start, end]`
    pub fn intersects_pages(&self, start: u32, end: u32) -> bool {
        self.pages().is_some_and(|(s, e)| s <= end && start <= e)
    }

    /// `char_span` if it lies inside the chunk and is strictly narrower than it
    pub fn narrow_char_span(&self) -> Option<CharRange> {
        self.char_span
            .filter(|span| !span.is_empty() && self.range().encloses(span) && span.len() < self.len())
    }

    /// Bounding boxes on `page`, in reading order
    pub fn bboxes_on_page(&self, page: u32) -> impl Iterator<Item = &ChunkBox> {
        self.bboxes.iter().filter(move |b| b.page == page)
    }
}

/// A validated, ordered, non-overlapping list of chunks
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    chunks: Vec<Chunk>,
}

impl Segmentation {
    /// Validate and order `chunks`.
    ///
    /// Overlapping, inverted or out-of-bounds chunk ranges are fatal. Gaps are
    /// logged and accepted.
    pub fn new(mut chunks: Vec<Chunk>, document_len: Option<usize>) -> Result<Self, AnchorError> {
        chunks.sort_by(|a, b| {
            a.char_start
                .cmp(&b.char_start)
                .then(a.char_end.cmp(&b.char_end))
        });

        for chunk in &chunks {
            if chunk.char_end <= chunk.char_start {
                return Err(AnchorError::InvariantViolation(format!(
                    "chunk '{}' has empty or inverted range {}..{}",
                    chunk.id, chunk.char_start, chunk.char_end
                )));
            }
            if let Some(len) = document_len {
                if chunk.char_end > len {
                    return Err(AnchorError::InvariantViolation(format!(
                        "chunk '{}' ends at {} past document length {}",
                        chunk.id, chunk.char_end, len
                    )));
                }
            }
        }

        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.char_start < prev.char_end {
                return Err(AnchorError::InvariantViolation(format!(
                    "chunks '{}' ({}..{}) and '{}' ({}..{}) overlap within one segmentation",
                    prev.id, prev.char_start, prev.char_end, next.id, next.char_start, next.char_end
                )));
            }
            if next.char_start > prev.char_end {
                warn!(
                    after = %prev.id,
                    gap_start = prev.char_end,
                    gap_end = next.char_start,
                    "Gap between chunks"
                );
            }
        }

        Ok(Self { chunks })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn position(&self, chunk_id: &str) -> Option<usize> {
        self.chunks.iter().position(|c| c.id == chunk_id)
    }

    /// Index of the chunk containing `offset`
    pub fn chunk_at(&self, offset: usize) -> Option<usize> {
        let idx = self.chunks.partition_point(|c| c.char_end <= offset);
        self.chunks
            .get(idx)
            .filter(|c| c.range().contains(offset))
            .map(|_| idx)
    }

    /// Indices of chunks intersecting `range`, in order
    pub fn overlapping(&self, range: &CharRange) -> Vec<usize> {
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.range().overlaps(range))
            .map(|(i, _)| i)
            .collect()
    }
}

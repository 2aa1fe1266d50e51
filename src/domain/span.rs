//! Spans: immutable "this text, roughly here" records.
//!
//! A span carries the selected text, up to 100 characters of context on each
//! side, and at least one location hint (flat-text range or page geometry).
//! All offsets are char (Unicode scalar) indices, half-open.

use serde::{Deserialize, Serialize};

use super::chunk::Chunk;
use crate::error::AnchorError;

/// Default number of context characters captured on each side of a span
pub const DEFAULT_CONTEXT_CHARS: usize = 100;

/// Half-open character range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CharRange {
    pub start: usize,
    pub end: usize,
}

impl CharRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `offset` falls inside the range
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Whether `other` lies entirely inside this range
    pub fn encloses(&self, other: &CharRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Length of the intersection with `other`
    pub fn intersection_len(&self, other: &CharRange) -> usize {
        self.end
            .min(other.end)
            .saturating_sub(self.start.max(other.start))
    }

    pub fn overlaps(&self, other: &CharRange) -> bool {
        self.intersection_len(other) > 0
    }

    /// Smallest range covering both
    pub fn cover(&self, other: &CharRange) -> CharRange {
        CharRange::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Rectangle in the paginated representation (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

/// Page plus selection rectangles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanGeometry {
    /// 1-indexed page number
    pub page: u32,
    #[serde(default)]
    pub rects: Vec<Rect>,
}

/// A captured text excerpt with its original location hints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// The anchored substring (never empty)
    pub text: String,

    /// Up to 100 chars preceding the text at capture time
    #[serde(default)]
    pub context_before: String,

    /// Up to 100 chars following the text at capture time
    #[serde(default)]
    pub context_after: String,

    /// Chunk the span was captured against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_chunk_id: Option<String>,

    /// Flat-text offsets at capture time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_char_range: Option<CharRange>,

    /// Paginated location at capture time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_geometry: Option<SpanGeometry>,
}

impl Span {
    /// Create a span from a flat-text selection
    pub fn from_range(
        text: impl Into<String>,
        context_before: impl Into<String>,
        context_after: impl Into<String>,
        range: CharRange,
    ) -> Self {
        Self {
            text: text.into(),
            context_before: context_before.into(),
            context_after: context_after.into(),
            origin_chunk_id: None,
            origin_char_range: Some(range),
            origin_geometry: None,
        }
    }

    /// Create a span from a paginated selection
    pub fn from_geometry(text: impl Into<String>, geometry: SpanGeometry) -> Self {
        Self {
            text: text.into(),
            context_before: String::new(),
            context_after: String::new(),
            origin_chunk_id: None,
            origin_char_range: None,
            origin_geometry: Some(geometry),
        }
    }

    pub fn with_origin_chunk(mut self, chunk_id: impl Into<String>) -> Self {
        self.origin_chunk_id = Some(chunk_id.into());
        self
    }

    pub fn with_geometry(mut self, geometry: SpanGeometry) -> Self {
        self.origin_geometry = Some(geometry);
        self
    }

    pub fn with_context(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.context_before = before.into();
        self.context_after = after.into();
        self
    }

    /// Capture a span over `range` of `document`.
    ///
    /// Records up to `context_chars` of surrounding text on each side and the
    /// chunk containing the start of the range.
    pub fn capture(
        document: &str,
        range: CharRange,
        chunks: &[Chunk],
        context_chars: usize,
    ) -> Result<Self, AnchorError> {
        let chars: Vec<char> = document.chars().collect();
        if range.is_empty() || range.end > chars.len() {
            return Err(AnchorError::InvalidRange {
                start: range.start,
                end: range.end,
                len: chars.len(),
            });
        }

        let text: String = chars[range.start..range.end].iter().collect();
        if text.trim().is_empty() {
            return Err(AnchorError::MalformedSpan(
                "selection contains only whitespace".to_string(),
            ));
        }

        let before_start = range.start.saturating_sub(context_chars);
        let after_end = (range.end + context_chars).min(chars.len());

        let origin_chunk_id = chunks
            .iter()
            .find(|c| c.range().contains(range.start))
            .map(|c| c.id.clone());

        Ok(Self {
            text,
            context_before: chars[before_start..range.start].iter().collect(),
            context_after: chars[range.end..after_end].iter().collect(),
            origin_chunk_id,
            origin_char_range: Some(range),
            origin_geometry: None,
        })
    }

    /// Number of chars in the anchored text
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Check the span invariants
    pub fn validate(&self) -> Result<(), AnchorError> {
        if self.text.trim().is_empty() {
            return Err(AnchorError::MalformedSpan("span text is empty".to_string()));
        }
        if self.origin_char_range.is_none() && self.origin_geometry.is_none() {
            return Err(AnchorError::MalformedSpan(format!(
                "span '{}' has neither origin_char_range nor origin_geometry",
                preview(&self.text)
            )));
        }
        if let Some(range) = self.origin_char_range {
            if range.is_empty() {
                return Err(AnchorError::MalformedSpan(format!(
                    "span '{}' has empty origin range {}..{}",
                    preview(&self.text),
                    range.start,
                    range.end
                )));
            }
        }
        Ok(())
    }
}

/// First 40 chars of a text, for messages
pub(crate) fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(40).collect();
    if text.chars().count() > 40 {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_range_overlap() {
        let a = CharRange::new(0, 10);
        let b = CharRange::new(5, 20);
        assert_eq!(a.intersection_len(&b), 5);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&CharRange::new(10, 12)));
        assert_eq!(a.cover(&b), CharRange::new(0, 20));
        assert!(CharRange::new(0, 30).encloses(&b));
    }

    #[test]
    fn test_validate_requires_location() {
        let span = Span {
            text: "hello".to_string(),
            context_before: String::new(),
            context_after: String::new(),
            origin_chunk_id: Some("c1".to_string()),
            origin_char_range: None,
            origin_geometry: None,
        };
        assert!(matches!(span.validate(), Err(AnchorError::MalformedSpan(_))));

        let span = span.with_geometry(SpanGeometry { page: 3, rects: vec![] });
        assert!(span.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_text() {
        let span = Span::from_range("  ", "", "", CharRange::new(0, 2));
        assert!(span.validate().is_err());
    }

    #[test]
    fn test_capture_records_context() {
        let doc = "alpha beta gamma delta";
        let span = Span::capture(doc, CharRange::new(6, 10), &[], 6).unwrap();
        assert_eq!(span.text, "beta");
        assert_eq!(span.context_before, "alpha ");
        assert_eq!(span.context_after, " gamma");
        assert_eq!(span.origin_char_range, Some(CharRange::new(6, 10)));
    }

    #[test]
    fn test_capture_uses_char_offsets() {
        let doc = "naïve café culture";
        let span = Span::capture(doc, CharRange::new(6, 10), &[], 100).unwrap();
        assert_eq!(span.text, "café");
        assert_eq!(span.context_before, "naïve ");
    }

    #[test]
    fn test_capture_rejects_out_of_bounds() {
        let result = Span::capture("short", CharRange::new(2, 40), &[], 10);
        assert!(matches!(result, Err(AnchorError::InvalidRange { .. })));
    }
}

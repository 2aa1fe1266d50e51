//! Anchors: persisted annotations tied to one or more spans.
//!
//! `current_*` and `recovery_*` fields are rewritten only by the recovery
//! orchestrator or the review operations. An orphaned anchor is inert but
//! retained until the user deletes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::span::{CharRange, Span};
use crate::error::AnchorError;

/// How an anchor's current location was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMethod {
    Exact,
    Context,
    ChunkBounded,
    Trigram,
    Semantic,
    Geometric,
    Manual,
    Orphaned,
    /// Rejected during review, or no tier found the text
    Lost,
}

impl RecoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryMethod::Exact => "exact",
            RecoveryMethod::Context => "context",
            RecoveryMethod::ChunkBounded => "chunk_bounded",
            RecoveryMethod::Trigram => "trigram",
            RecoveryMethod::Semantic => "semantic",
            RecoveryMethod::Geometric => "geometric",
            RecoveryMethod::Manual => "manual",
            RecoveryMethod::Orphaned => "orphaned",
            RecoveryMethod::Lost => "lost",
        }
    }

    /// Rank used when combining several spans: lower is more precise.
    pub(crate) fn precision_rank(&self) -> u8 {
        match self {
            RecoveryMethod::Manual => 0,
            RecoveryMethod::Exact => 1,
            RecoveryMethod::Geometric => 2,
            RecoveryMethod::Context => 3,
            RecoveryMethod::ChunkBounded => 4,
            RecoveryMethod::Trigram => 5,
            RecoveryMethod::Semantic => 6,
            RecoveryMethod::Orphaned => 7,
            RecoveryMethod::Lost => 8,
        }
    }
}

impl std::fmt::Display for RecoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Kind of entity that owns the anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Highlight over a selection
    Annotation,
    /// Free-form note, possibly without a selection
    Note,
    Flashcard,
    /// Captured thought with optional selections
    Spark,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Annotation => "annotation",
            EntityKind::Note => "note",
            EntityKind::Flashcard => "flashcard",
            EntityKind::Spark => "spark",
        }
    }
}

/// Derived placement state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatus {
    Recovered,
    NeedsReview,
    Orphaned,
}

/// A persisted annotation anchored to the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: Uuid,
    pub document_id: String,
    pub entity_kind: EntityKind,

    /// Selections; empty only for context-free notes
    #[serde(default)]
    pub spans: Vec<Span>,

    /// Note body, used to build the semantic fallback query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Chunks the anchor was created against
    #[serde(default)]
    pub origin_chunk_ids: Vec<String>,

    /// Excerpt of the origin chunk content retained at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_excerpt: Option<String>,

    /// Authoritative current location, None when orphaned
    pub current_char_range: Option<CharRange>,

    #[serde(default)]
    pub current_chunk_ids: Vec<String>,

    pub recovery_confidence: f64,
    pub recovery_method: RecoveryMethod,
    pub needs_review: bool,

    /// Diagnostic attached when the anchor lands in the review queue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,

    /// Key of the snapshot this anchor was last recovered against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_key: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Anchor {
    /// Create an anchor for one or more selections.
    ///
    /// Rejects malformed spans. The initial location covers every span's
    /// origin range.
    pub fn for_selections(
        document_id: impl Into<String>,
        entity_kind: EntityKind,
        spans: Vec<Span>,
    ) -> Result<Self, AnchorError> {
        if spans.is_empty() {
            return Err(AnchorError::MalformedSpan(
                "selection anchor needs at least one span".to_string(),
            ));
        }
        for span in &spans {
            span.validate()?;
        }

        let current_char_range = spans
            .iter()
            .filter_map(|s| s.origin_char_range)
            .reduce(|a, b| a.cover(&b));
        let mut current_chunk_ids: Vec<String> = Vec::new();
        for id in spans.iter().filter_map(|s| s.origin_chunk_id.as_ref()) {
            if !current_chunk_ids.contains(id) {
                current_chunk_ids.push(id.clone());
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            document_id: document_id.into(),
            entity_kind,
            origin_chunk_ids: current_chunk_ids.clone(),
            spans,
            note: None,
            origin_excerpt: None,
            current_char_range,
            current_chunk_ids,
            recovery_confidence: 1.0,
            recovery_method: RecoveryMethod::Exact,
            needs_review: false,
            review_reason: None,
            recovery_key: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Create a free-text note anchored only to a chunk.
    pub fn for_note(
        document_id: impl Into<String>,
        note: impl Into<String>,
        origin_chunk_id: impl Into<String>,
        origin_range: CharRange,
        origin_excerpt: impl Into<String>,
    ) -> Result<Self, AnchorError> {
        let note = note.into();
        if note.trim().is_empty() {
            return Err(AnchorError::MalformedSpan("note content is empty".to_string()));
        }
        let chunk_id = origin_chunk_id.into();
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            document_id: document_id.into(),
            entity_kind: EntityKind::Note,
            spans: Vec::new(),
            note: Some(note),
            origin_chunk_ids: vec![chunk_id.clone()],
            origin_excerpt: Some(origin_excerpt.into()),
            current_char_range: Some(origin_range),
            current_chunk_ids: vec![chunk_id],
            recovery_confidence: 1.0,
            recovery_method: RecoveryMethod::Manual,
            needs_review: false,
            review_reason: None,
            recovery_key: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_origin_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.origin_excerpt = Some(excerpt.into());
        self
    }

    /// Check the anchor invariants
    pub fn validate(&self) -> Result<(), AnchorError> {
        if self.spans.is_empty() {
            if self.origin_chunk_ids.is_empty() || self.note.is_none() {
                return Err(AnchorError::MalformedSpan(format!(
                    "anchor {} has no spans and is not a chunk-anchored note",
                    self.id
                )));
            }
            return Ok(());
        }
        self.spans.iter().try_for_each(Span::validate)
    }

    /// Whether any span can be located by text
    pub fn has_text_spans(&self) -> bool {
        !self.spans.is_empty()
    }

    pub fn status(&self) -> AnchorStatus {
        if matches!(
            self.recovery_method,
            RecoveryMethod::Orphaned | RecoveryMethod::Lost
        ) || self.current_char_range.is_none()
        {
            AnchorStatus::Orphaned
        } else if self.needs_review {
            AnchorStatus::NeedsReview
        } else {
            AnchorStatus::Recovered
        }
    }

    /// Text used for the semantic fallback query: note, span texts and at
    /// most `excerpt_chars` of the retained excerpt
    pub fn semantic_query(&self, excerpt_chars: usize) -> String {
        let excerpt: Option<String> = self
            .origin_excerpt
            .as_deref()
            .map(|e| e.trim().chars().take(excerpt_chars).collect());

        let mut parts: Vec<&str> = Vec::new();
        if let Some(note) = self.note.as_deref() {
            parts.push(note);
        }
        for span in &self.spans {
            parts.push(&span.text);
        }
        if let Some(excerpt) = excerpt.as_deref() {
            parts.push(excerpt);
        }
        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::span::SpanGeometry;

    #[test]
    fn test_for_selections_covers_spans() {
        let spans = vec![
            Span::from_range("alpha", "", "", CharRange::new(10, 15)).with_origin_chunk("c1"),
            Span::from_range("omega", "", "", CharRange::new(40, 45)).with_origin_chunk("c2"),
        ];
        let anchor = Anchor::for_selections("doc", EntityKind::Annotation, spans).unwrap();
        assert_eq!(anchor.current_char_range, Some(CharRange::new(10, 45)));
        assert_eq!(anchor.current_chunk_ids, vec!["c1", "c2"]);
        assert_eq!(anchor.status(), AnchorStatus::Recovered);
    }

    #[test]
    fn test_for_selections_rejects_malformed_span() {
        let span = Span {
            text: "floating".to_string(),
            context_before: String::new(),
            context_after: String::new(),
            origin_chunk_id: None,
            origin_char_range: None,
            origin_geometry: None,
        };
        let result = Anchor::for_selections("doc", EntityKind::Annotation, vec![span]);
        assert!(matches!(result, Err(AnchorError::MalformedSpan(_))));
    }

    #[test]
    fn test_geometry_only_selection_has_no_range() {
        let span = Span::from_geometry("caption", SpanGeometry { page: 2, rects: vec![] });
        let anchor = Anchor::for_selections("doc", EntityKind::Annotation, vec![span]).unwrap();
        assert_eq!(anchor.current_char_range, None);
    }

    #[test]
    fn test_note_semantic_query() {
        let anchor = Anchor::for_note(
            "doc",
            "links to deleuze",
            "c7",
            CharRange::new(0, 100),
            "rhizomes have no center",
        )
        .unwrap();
        assert!(anchor.validate().is_ok());
        assert_eq!(anchor.semantic_query(500), "links to deleuze\n\nrhizomes have no center");
        assert_eq!(anchor.semantic_query(8), "links to deleuze\n\nrhizomes");
    }

    #[test]
    fn test_status_orphaned_when_lost() {
        let mut anchor = Anchor::for_note("doc", "n", "c1", CharRange::new(0, 5), "x").unwrap();
        anchor.recovery_method = RecoveryMethod::Lost;
        assert_eq!(anchor.status(), AnchorStatus::Orphaned);
    }

    #[test]
    fn test_method_serialization() {
        let json = serde_json::to_string(&RecoveryMethod::ChunkBounded).unwrap();
        assert_eq!(json, "\"chunk_bounded\"");
    }
}

//! Metadata transfer between two independent segmentations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fields::{
    CategoricalField, FieldAccumulator, FieldKind, GeometricField, ListField, OrderKey, RangeField,
    TaggedBox,
};
use crate::domain::{CharRange, Chunk, ContentLabel, ContentLayer, Segmentation};
use crate::matching::range_overlap;

/// Minimum share of the target a source must cover to count as corroborating
const COVERAGE_THRESHOLD: f64 = 0.7;

/// Advisory confidence of an aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationConfidence {
    Low,
    Medium,
    High,
}

/// Accumulated metadata for one target chunk
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedFields {
    pub heading_path: ListField<String>,
    pub pages: RangeField<u32>,
    pub char_span: RangeField<usize>,
    pub source_range: RangeField<usize>,
    pub content_layer: CategoricalField<ContentLayer>,
    pub content_label: CategoricalField<ContentLabel>,
    pub bboxes: GeometricField,
    pub source_chunk_ids: ListField<String>,
    pub confidence: AggregationConfidence,
}

impl Default for AggregatedFields {
    fn default() -> Self {
        Self {
            heading_path: ListField::default(),
            pages: RangeField::default(),
            char_span: RangeField::default(),
            source_range: RangeField::default(),
            content_layer: CategoricalField::with_preferred(ContentLayer::Body),
            content_label: CategoricalField::default(),
            bboxes: GeometricField::default(),
            source_chunk_ids: ListField::default(),
            confidence: AggregationConfidence::Low,
        }
    }
}

impl AggregatedFields {
    /// Field names and their aggregation kinds
    pub const FIELD_KINDS: &'static [(&'static str, FieldKind)] = &[
        ("heading_path", <ListField<String> as FieldAccumulator>::KIND),
        ("pages", <RangeField<u32> as FieldAccumulator>::KIND),
        ("char_span", <RangeField<usize> as FieldAccumulator>::KIND),
        ("source_range", <RangeField<usize> as FieldAccumulator>::KIND),
        ("content_layer", <CategoricalField<ContentLayer> as FieldAccumulator>::KIND),
        ("content_label", <CategoricalField<ContentLabel> as FieldAccumulator>::KIND),
        ("bboxes", <GeometricField as FieldAccumulator>::KIND),
        ("source_chunk_ids", <ListField<String> as FieldAccumulator>::KIND),
    ];

    /// Contribution of a single source, or None when it does not overlap
    pub fn from_source(target: &Chunk, source: &Chunk) -> Option<Self> {
        let target_range = target.range();
        let source_range = source.range();
        if range_overlap(&target_range, &source_range) <= 0.0 {
            return None;
        }

        let mut fields = Self::default();
        let base = |pos: usize| -> OrderKey {
            (source.char_start, source.char_end, source.id.clone(), pos)
        };

        for (pos, heading) in source.heading_path.iter().enumerate() {
            fields.heading_path.push(heading.clone(), base(pos));
        }
        if let Some((start, end)) = source.pages() {
            fields.pages.include(start, end);
        }
        if let Some(span) = source.char_span {
            fields.char_span.include(span.start, span.end);
        }
        fields.source_range.include(source.char_start, source.char_end);
        if let Some(layer) = source.content_layer {
            fields.content_layer.record(layer);
        }
        if let Some(label) = source.content_label {
            fields.content_label.record(label);
        }
        for (pos, bbox) in source.bboxes.iter().enumerate() {
            fields.bboxes.push(
                base(pos),
                TaggedBox {
                    page: bbox.page,
                    source_chunk_id: source.id.clone(),
                    bbox: *bbox,
                },
            );
        }
        fields.source_chunk_ids.push(source.id.clone(), base(0));
        fields.confidence = source_confidence(&target_range, source);

        Some(fields)
    }

    /// Union with another partial aggregation using the per-kind rules
    pub fn merge(&mut self, other: Self) {
        self.heading_path.merge(other.heading_path);
        self.pages.merge(other.pages);
        self.char_span.merge(other.char_span);
        self.source_range.merge(other.source_range);
        self.content_layer.merge(other.content_layer);
        self.content_label.merge(other.content_label);
        self.bboxes.merge(other.bboxes);
        self.source_chunk_ids.merge(other.source_chunk_ids);
        self.confidence = self.confidence.max(other.confidence);
    }

    /// Whether no source contributed
    pub fn is_empty(&self) -> bool {
        self.source_chunk_ids.is_empty()
    }

    /// Resolved values
    pub fn metadata(&self) -> AggregatedMetadata {
        let pages = self.pages.value();
        AggregatedMetadata {
            heading_path: self.heading_path.value(),
            page_start: pages.map(|(s, _)| s),
            page_end: pages.map(|(_, e)| e),
            char_span: self.char_span.value().map(|(s, e)| CharRange::new(s, e)),
            source_range: self.source_range.value().map(|(s, e)| CharRange::new(s, e)),
            content_layer: self.content_layer.value(),
            content_label: self.content_label.value(),
            bboxes: self.bboxes.value(),
            source_chunk_ids: self.source_chunk_ids.value(),
            confidence: self.confidence,
        }
    }
}

/// Confidence contributed by one overlapping source
fn source_confidence(target: &CharRange, source: &Chunk) -> AggregationConfidence {
    let coverage = if target.is_empty() {
        0.0
    } else {
        target.intersection_len(&source.range()) as f64 / target.len() as f64
    };
    let corroborated = source
        .char_span
        .is_some_and(|span| span.overlaps(target));

    if coverage >= COVERAGE_THRESHOLD && corroborated {
        AggregationConfidence::High
    } else if range_overlap(target, &source.range()) > COVERAGE_THRESHOLD {
        AggregationConfidence::Medium
    } else {
        AggregationConfidence::Low
    }
}

/// Aggregate metadata onto `target` from every overlapping source.
///
/// Sources that do not overlap are ignored; with none left the result has
/// every field empty, which is valid output.
pub fn aggregate(target: &Chunk, sources: &[Chunk]) -> AggregatedFields {
    let mut fields = AggregatedFields::default();
    for source in sources {
        if let Some(contribution) = AggregatedFields::from_source(target, source) {
            fields.merge(contribution);
        }
    }
    fields
}

/// Resolved, serializable aggregation result for one target chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetadata {
    pub heading_path: Vec<String>,
    pub page_start: Option<u32>,
    pub page_end: Option<u32>,
    pub char_span: Option<CharRange>,
    pub source_range: Option<CharRange>,
    pub content_layer: Option<ContentLayer>,
    pub content_label: Option<ContentLabel>,
    pub bboxes: Vec<TaggedBox>,
    pub source_chunk_ids: Vec<String>,
    pub confidence: AggregationConfidence,
}

impl AggregatedMetadata {
    /// False when the inherited classification marks the chunk as
    /// boilerplate (furniture, page headers and footers)
    pub fn is_body_content(&self) -> bool {
        let layer_ok = self
            .content_layer
            .map_or(true, |layer| layer == ContentLayer::Body);
        let label_ok = !matches!(
            self.content_label,
            Some(ContentLabel::PageHeader | ContentLabel::PageFooter)
        );
        layer_ok && label_ok
    }
}

/// Aggregation result attached to one target chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedChunk {
    pub chunk_id: String,
    pub char_start: usize,
    pub char_end: usize,
    pub metadata: AggregatedMetadata,
}

/// Aggregate every chunk of `targets` from `sources`
pub fn aggregate_segmentation(targets: &Segmentation, sources: &Segmentation) -> Vec<AggregatedChunk> {
    let source_chunks = sources.chunks();
    targets
        .chunks()
        .iter()
        .map(|target| {
            let range = target.range();
            let overlapping: Vec<Chunk> = sources
                .overlapping(&range)
                .into_iter()
                .map(|i| source_chunks[i].clone())
                .collect();
            let fields = aggregate(target, &overlapping);
            debug!(
                chunk = %target.id,
                sources = overlapping.len(),
                confidence = ?fields.confidence,
                "Aggregated chunk metadata"
            );
            AggregatedChunk {
                chunk_id: target.id.clone(),
                char_start: target.char_start,
                char_end: target.char_end,
                metadata: fields.metadata(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_code_source_transfers_label() {
        let source = Chunk::new("a0", 0, 300).with_label(ContentLabel::Code);
        let target = Chunk::new("b0", 200, 500);
        let meta = aggregate(&target, &[source]).metadata();
        assert_eq!(meta.content_label, Some(ContentLabel::Code));
        assert_eq!(meta.source_range, Some(CharRange::new(0, 300)));
        assert_eq!(meta.confidence, AggregationConfidence::Low);
    }

    #[test]
    fn test_no_overlap_yields_empty_fields() {
        let source = Chunk::new("a0", 0, 100).with_label(ContentLabel::Code);
        let target = Chunk::new("b0", 100, 200);
        let fields = aggregate(&target, &[source]);
        assert!(fields.is_empty());
        let meta = fields.metadata();
        assert_eq!(meta.content_label, None);
        assert_eq!(meta.source_range, None);
        assert!(meta.heading_path.is_empty());
        assert_eq!(meta.confidence, AggregationConfidence::Low);
    }

    #[test]
    fn test_body_layer_is_preferred() {
        let target = Chunk::new("b0", 0, 300);
        let sources = vec![
            Chunk::new("a0", 0, 100).with_layer(ContentLayer::Furniture),
            Chunk::new("a1", 100, 200).with_layer(ContentLayer::Furniture),
            Chunk::new("a2", 200, 300).with_layer(ContentLayer::Body),
        ];
        let meta = aggregate(&target, &sources).metadata();
        assert_eq!(meta.content_layer, Some(ContentLayer::Body));
        assert!(meta.is_body_content());
    }

    #[test]
    fn test_confidence_levels() {
        let target = Chunk::new("b0", 100, 200);

        let high = Chunk::new("a0", 90, 210).with_char_span(120, 180);
        assert_eq!(aggregate(&target, &[high]).confidence, AggregationConfidence::High);

        let medium = Chunk::new("a0", 90, 210);
        assert_eq!(aggregate(&target, &[medium]).confidence, AggregationConfidence::Medium);

        let low = Chunk::new("a0", 0, 120);
        assert_eq!(aggregate(&target, &[low]).confidence, AggregationConfidence::Low);
    }

    #[test]
    fn test_heading_union_in_document_order() {
        let target = Chunk::new("b0", 0, 200);
        let sources = vec![
            Chunk::new("a1", 100, 200).with_headings(["Ch1", "Sec2"]),
            Chunk::new("a0", 0, 100).with_headings(["Ch1", "Sec1"]),
        ];
        let meta = aggregate(&target, &sources).metadata();
        assert_eq!(meta.heading_path, vec!["Ch1", "Sec1", "Sec2"]);
        assert_eq!(meta.source_chunk_ids, vec!["a0", "a1"]);
    }

    #[test]
    fn test_field_kinds_cover_every_field() {
        assert_eq!(AggregatedFields::FIELD_KINDS.len(), 8);
        assert!(AggregatedFields::FIELD_KINDS.contains(&("bboxes", FieldKind::Geometric)));
        // Printed names match the serialized form
        for (_, kind) in AggregatedFields::FIELD_KINDS {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }
}

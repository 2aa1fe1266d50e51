//! Metadata aggregation across chunk segmentations.
//!
//! For each chunk of a target segmentation, structural metadata is
//! inherited from every overlapping chunk of a source segmentation using
//! per-kind rules (list, range, categorical, geometric).

pub mod aggregator;
pub mod fields;

pub use aggregator::{
    aggregate, aggregate_segmentation, AggregatedChunk, AggregatedFields, AggregatedMetadata,
    AggregationConfidence,
};
pub use fields::{
    CategoricalField, FieldAccumulator, FieldKind, GeometricField, ListField, RangeField, TaggedBox,
};

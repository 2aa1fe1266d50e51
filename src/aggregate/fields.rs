//! Field-kind accumulators.
//!
//! Every aggregated field is one of four kinds, each with a single merge
//! rule. Merges are associative and commutative, so partial aggregations over
//! disjoint source sets can be combined in any order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::ChunkBox;

/// Aggregation rule family of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Union, de-duplicated, ordered by first occurrence
    List,
    /// Min of starts, max of ends
    Range,
    /// Preferred value if present, else most frequent
    Categorical,
    /// Concatenation, tagged with source page
    Geometric,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::List => "list",
            FieldKind::Range => "range",
            FieldKind::Categorical => "categorical",
            FieldKind::Geometric => "geometric",
        }
    }
}

/// Common merge contract of all accumulators
pub trait FieldAccumulator: Default {
    type Output;

    const KIND: FieldKind;

    fn merge(&mut self, other: Self);

    fn value(&self) -> Self::Output;
}

/// Position of a contribution in document order: source start, source end,
/// source id, index within the source's list
pub type OrderKey = (usize, usize, String, usize);

/// List-valued field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListField<T: Ord> {
    /// Each distinct value with its earliest position
    first_seen: BTreeMap<T, OrderKey>,
}

impl<T: Ord> Default for ListField<T> {
    fn default() -> Self {
        Self {
            first_seen: BTreeMap::new(),
        }
    }
}

impl<T: Ord + Clone> ListField<T> {
    pub fn push(&mut self, value: T, key: OrderKey) {
        match self.first_seen.get_mut(&value) {
            Some(existing) if *existing <= key => {}
            Some(existing) => *existing = key,
            None => {
                self.first_seen.insert(value, key);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }
}

impl<T: Ord + Clone> FieldAccumulator for ListField<T> {
    type Output = Vec<T>;

    const KIND: FieldKind = FieldKind::List;

    fn merge(&mut self, other: Self) {
        for (value, key) in other.first_seen {
            self.push(value, key);
        }
    }

    fn value(&self) -> Vec<T> {
        let mut entries: Vec<(&OrderKey, &T)> = self.first_seen.iter().map(|(v, k)| (k, v)).collect();
        entries.sort();
        entries.into_iter().map(|(_, v)| v.clone()).collect()
    }
}

/// Range-valued field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeField<T: Ord + Copy> {
    bounds: Option<(T, T)>,
}

impl<T: Ord + Copy> Default for RangeField<T> {
    fn default() -> Self {
        Self { bounds: None }
    }
}

impl<T: Ord + Copy> RangeField<T> {
    pub fn include(&mut self, start: T, end: T) {
        let (start, end) = (start.min(end), start.max(end));
        self.bounds = Some(match self.bounds {
            Some((s, e)) => (s.min(start), e.max(end)),
            None => (start, end),
        });
    }
}

impl<T: Ord + Copy> FieldAccumulator for RangeField<T> {
    type Output = Option<(T, T)>;

    const KIND: FieldKind = FieldKind::Range;

    fn merge(&mut self, other: Self) {
        if let Some((s, e)) = other.bounds {
            self.include(s, e);
        }
    }

    fn value(&self) -> Option<(T, T)> {
        self.bounds
    }
}

/// Categorical field with an optional preferred value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalField<T: Ord> {
    counts: BTreeMap<T, usize>,
    preferred: Option<T>,
}

impl<T: Ord> Default for CategoricalField<T> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
            preferred: None,
        }
    }
}

impl<T: Ord + Copy> CategoricalField<T> {
    pub fn with_preferred(preferred: T) -> Self {
        Self {
            counts: BTreeMap::new(),
            preferred: Some(preferred),
        }
    }

    pub fn record(&mut self, value: T) {
        *self.counts.entry(value).or_insert(0) += 1;
    }
}

impl<T: Ord + Copy> FieldAccumulator for CategoricalField<T> {
    type Output = Option<T>;

    const KIND: FieldKind = FieldKind::Categorical;

    fn merge(&mut self, other: Self) {
        if self.preferred.is_none() {
            self.preferred = other.preferred;
        }
        for (value, count) in other.counts {
            *self.counts.entry(value).or_insert(0) += count;
        }
    }

    /// Preferred value if declared by any source, else the most frequent
    /// (ties go to the smallest value), else None
    fn value(&self) -> Option<T> {
        if let Some(preferred) = self.preferred {
            if self.counts.contains_key(&preferred) {
                return Some(preferred);
            }
        }
        let mut best: Option<(T, usize)> = None;
        for (value, count) in &self.counts {
            if best.map_or(true, |(_, c)| *count > c) {
                best = Some((*value, *count));
            }
        }
        best.map(|(v, _)| v)
    }
}

/// Bounding box inherited from a source chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedBox {
    pub page: u32,
    pub source_chunk_id: String,
    pub bbox: ChunkBox,
}

/// Geometric list field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometricField {
    boxes: BTreeMap<OrderKey, TaggedBox>,
}

impl GeometricField {
    pub fn push(&mut self, key: OrderKey, tagged: TaggedBox) {
        self.boxes.entry(key).or_insert(tagged);
    }
}

impl FieldAccumulator for GeometricField {
    type Output = Vec<TaggedBox>;

    const KIND: FieldKind = FieldKind::Geometric;

    fn merge(&mut self, other: Self) {
        for (key, tagged) in other.boxes {
            self.push(key, tagged);
        }
    }

    fn value(&self) -> Vec<TaggedBox> {
        self.boxes.values().cloned().collect()
    }
}

//! Overlap and similarity primitives.
//!
//! All scorers are pure and deterministic. Text scorers work on char slices
//! so callers can score windows of a normalized document without copying.

use std::collections::HashSet;

use crate::domain::{CharRange, Rect};

/// Character trigram
pub type Trigram = [char; 3];

/// Find all start offsets where `needle` occurs in `haystack`.
///
/// Simple sliding window search, O(n*m) worst case. Search windows are
/// bounded by the caller.
pub fn find_exact_matches(haystack: &[char], needle: &[char]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for i in 0..=(haystack.len() - needle.len()) {
        if haystack[i..i + needle.len()] == *needle {
            matches.push(i);
        }
    }
    matches
}

/// Char slice iterable by reference, as `strsim`'s generic scorers expect
struct CharSlice<'a>(&'a [char]);

impl<'a> IntoIterator for &CharSlice<'a> {
    type Item = &'a char;
    type IntoIter = std::slice::Iter<'a, char>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Normalized edit similarity `1 - distance / max(len_a, len_b)`
pub fn edit_similarity(a: &[char], b: &[char]) -> f64 {
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::generic_levenshtein(&CharSlice(a), &CharSlice(b));
    1.0 - distance as f64 / max_len as f64
}

/// Set of char trigrams
pub fn trigrams(chars: &[char]) -> HashSet<Trigram> {
    chars.windows(3).map(|w| [w[0], w[1], w[2]]).collect()
}

/// Jaccard similarity of two trigram sets
pub fn jaccard(a: &HashSet<Trigram>, b: &HashSet<Trigram>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Overlap of two intervals relative to the shorter one
pub fn interval_overlap(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> f64 {
    let (a_start, a_end) = (a_start.min(a_end), a_start.max(a_end));
    let (b_start, b_end) = (b_start.min(b_end), b_start.max(b_end));
    let shorter = (a_end - a_start).min(b_end - b_start);
    if shorter <= 0.0 {
        return 0.0;
    }
    let intersection = (a_end.min(b_end) - a_start.max(b_start)).max(0.0);
    intersection / shorter
}

/// 1-D range overlap fraction:
/// `max(0, min(end_a, end_b) - max(start_a, start_b)) / len(shorter)`
pub fn range_overlap(a: &CharRange, b: &CharRange) -> f64 {
    let shorter = a.len().min(b.len());
    if shorter == 0 {
        return 0.0;
    }
    a.intersection_len(b) as f64 / shorter as f64
}

/// 2-D bounding box overlap: the 1-D fraction per axis, multiplied
pub fn bbox_overlap(a: &Rect, b: &Rect) -> f64 {
    interval_overlap(a.x, a.x + a.w, b.x, b.x + b.w) * interval_overlap(a.y, a.y + a.h, b.y, b.y + b.h)
}

/// Cosine similarity of two vectors.
///
/// None when dimensions differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

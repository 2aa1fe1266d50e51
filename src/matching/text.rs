//! Text normalization with offset maps back to the original text.
//!
//! Whitespace runs always collapse to a single space. With typographic
//! folding enabled, quote variants become `"`, dash variants become `-`,
//! soft hyphens disappear and line-break hyphenation is rejoined.
//!
//! Matching happens on normalized chars; every reported offset is mapped
//! back to char offsets in the original text.

use crate::domain::CharRange;

const SOFT_HYPHEN: char = '\u{00AD}';

/// Map typographic variants to a canonical char
pub fn fold_char(c: char) -> char {
    match c {
        '\'' | '"' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{201C}'
        | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' | '\u{2039}'
        | '\u{203A}' | '\u{2032}' | '\u{2033}' | '`' | '\u{00B4}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' | '\u{FE58}' | '\u{FE63}' | '\u{FF0D}' => '-',
        other => other,
    }
}

/// Normalized view over a text
#[derive(Debug, Clone)]
pub struct NormalizedText {
    chars: Vec<char>,
    /// Original char index of each normalized char
    origin: Vec<usize>,
    /// Normalized index for each original char index, plus one past the end
    to_normalized: Vec<usize>,
}

impl NormalizedText {
    pub fn new(text: &str, fold: bool) -> Self {
        let source: Vec<char> = text.chars().collect();
        let n = source.len();
        let mut chars = Vec::with_capacity(n);
        let mut origin = Vec::with_capacity(n);
        let mut to_normalized = Vec::with_capacity(n + 1);

        let mut i = 0;
        while i < n {
            let c = source[i];

            if c.is_whitespace() {
                to_normalized.push(chars.len());
                chars.push(' ');
                origin.push(i);
                i += 1;
                while i < n && source[i].is_whitespace() {
                    to_normalized.push(chars.len());
                    i += 1;
                }
                continue;
            }

            if fold {
                let folded = fold_char(c);
                let hyphen = c == SOFT_HYPHEN || folded == '-';
                if hyphen && i > 0 && !source[i - 1].is_whitespace() {
                    if let Some(rejoin_at) = line_break_after(&source, i + 1) {
                        for _ in i..rejoin_at {
                            to_normalized.push(chars.len());
                        }
                        i = rejoin_at;
                        continue;
                    }
                }
                if c == SOFT_HYPHEN {
                    to_normalized.push(chars.len());
                    i += 1;
                    continue;
                }
                to_normalized.push(chars.len());
                chars.push(folded);
                origin.push(i);
                i += 1;
                continue;
            }

            to_normalized.push(chars.len());
            chars.push(c);
            origin.push(i);
            i += 1;
        }
        to_normalized.push(chars.len());

        Self {
            chars,
            origin,
            to_normalized,
        }
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Length of the original text in chars
    pub fn original_len(&self) -> usize {
        self.to_normalized.len() - 1
    }

    /// Map a normalized range `[start, end)` to original char offsets
    pub fn to_original_range(&self, start: usize, end: usize) -> CharRange {
        if start >= end || start >= self.origin.len() {
            let at = self.origin.get(start).copied().unwrap_or(self.original_len());
            return CharRange::new(at, at);
        }
        let end = end.min(self.origin.len());
        CharRange::new(self.origin[start], self.origin[end - 1] + 1)
    }

    /// Map an original char offset to its normalized position
    pub fn to_normalized_offset(&self, offset: usize) -> usize {
        let clamped = offset.min(self.original_len());
        self.to_normalized[clamped]
    }

    /// Map an original range to a normalized `(start, end)` pair
    pub fn to_normalized_range(&self, range: &CharRange) -> (usize, usize) {
        (
            self.to_normalized_offset(range.start),
            self.to_normalized_offset(range.end),
        )
    }
}

/// If a whitespace run containing a line break starts at `from` and is
/// followed by more text, return the index just after the run.
fn line_break_after(source: &[char], from: usize) -> Option<usize> {
    let mut j = from;
    let mut saw_break = false;
    while j < source.len() && source[j].is_whitespace() {
        saw_break |= matches!(source[j], '\n' | '\r' | '\u{2028}' | '\u{2029}');
        j += 1;
    }
    (saw_break && j > from && j < source.len()).then_some(j)
}

/// Normalized chars of a query or context string
pub fn normalize_chars(text: &str, fold: bool) -> Vec<char> {
    NormalizedText::new(text, fold).chars
}

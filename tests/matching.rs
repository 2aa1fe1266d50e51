//! Matching Integration Tests
//!
//! Tests for the tiered matcher against edited documents: scope narrowing,
//! tier ordering, thresholds and normalization.

use anchorkit::domain::{CharRange, Chunk, RecoveryMethod, Span};
use anchorkit::error::AnchorError;
use anchorkit::matching::{AttemptStatus, MatcherConfig, ScopeKind, TieredMatcher};

const PHRASE: &str = "the rhizome opposes hierarchy";
const TYPO: &str = "the rhizome oposes hierarchy";

fn filler(len: usize) -> String {
    "Lorem ipsum dolor sit amet, consectetur adipiscing elit. "
        .chars()
        .cycle()
        .take(len)
        .collect()
}

/// 1000-char document with `middle` at offset 550
fn document_with(middle: &str) -> String {
    let tail = 1000 - 550 - PHRASE.len();
    format!("{}{}{}", filler(550), middle, filler(tail))
}

fn windowed_chunks() -> Vec<Chunk> {
    vec![Chunk::new("c0", 400, 900).with_char_span(500, 700)]
}

fn captured_span() -> Span {
    Span::capture(
        &document_with(PHRASE),
        CharRange::new(550, 579),
        &windowed_chunks(),
        100,
    )
    .unwrap()
}

#[test]
fn test_exact_match_inside_char_span_window() {
    let matcher = TieredMatcher::new(MatcherConfig::default());
    let span = captured_span();
    assert_eq!(span.origin_chunk_id.as_deref(), Some("c0"));

    let result = matcher
        .match_text(&span, &document_with(PHRASE), windowed_chunks())
        .unwrap();

    assert!(result.found);
    assert_eq!(result.method, RecoveryMethod::Exact);
    assert_eq!(result.confidence, 1.0);
    assert_eq!(result.char_range, Some(CharRange::new(550, 579)));
    assert_eq!(result.scope, Some(ScopeKind::CharSpan));
    // Only the 200-char precise window was searched
    assert_eq!(result.searched_chars, 200);
    assert_eq!(result.matched_chunk_id.as_deref(), Some("c0"));
}

#[test]
fn test_typo_falls_through_to_context() {
    let matcher = TieredMatcher::new(MatcherConfig::default());
    let result = matcher
        .match_text(&captured_span(), &document_with(TYPO), windowed_chunks())
        .unwrap();

    assert!(result.found);
    assert_eq!(result.method, RecoveryMethod::Context);
    assert!(result.confidence >= 0.75 && result.confidence < 1.0);
    assert_eq!(result.scope, Some(ScopeKind::Origin));

    let range = result.char_range.unwrap();
    assert_eq!(range.start, 550);
    assert!((577..=579).contains(&range.end), "unexpected end {}", range.end);

    assert_eq!(result.attempts[0].method, RecoveryMethod::Exact);
    assert_eq!(result.attempts[0].status, AttemptStatus::Rejected);
}

#[test]
fn test_reflowed_whitespace_is_still_exact() {
    let matcher = TieredMatcher::new(MatcherConfig::default());
    let reflowed = format!(
        "{}{}{}",
        filler(550),
        "the  rhizome\nopposes hierarchy",
        filler(1000 - 550 - PHRASE.len())
    );

    let result = matcher
        .match_text(&captured_span(), &reflowed, vec![Chunk::new("c0", 400, 901).with_char_span(500, 700)])
        .unwrap();

    assert_eq!(result.method, RecoveryMethod::Exact);
    // Offsets are reported in the original text, spanning the extra space
    assert_eq!(result.char_range, Some(CharRange::new(550, 580)));
}

#[test]
fn test_edits_outside_context_keep_exact() {
    let matcher = TieredMatcher::new(MatcherConfig::default());
    let mut chars: Vec<char> = document_with(PHRASE).chars().collect();
    for c in chars.iter_mut().take(40) {
        *c = 'x';
    }
    for c in chars.iter_mut().skip(900) {
        *c = 'z';
    }
    let edited: String = chars.into_iter().collect();

    let result = matcher
        .match_text(&captured_span(), &edited, windowed_chunks())
        .unwrap();

    assert_eq!(result.method, RecoveryMethod::Exact);
    assert_eq!(result.confidence, 1.0);
    assert_eq!(result.char_range, Some(CharRange::new(550, 579)));
}

#[test]
fn test_threshold_is_inclusive() {
    let text = "abcdefghijklmnoVWXYZ";
    let span = Span::from_range("abcdefghijklmnopqrst", "", "", CharRange::new(0, 20));
    let chunks = vec![Chunk::new("c0", 0, 20)];

    let result = TieredMatcher::new(MatcherConfig::default())
        .match_text(&span, text, chunks.clone())
        .unwrap();
    assert!(result.found);
    assert_eq!(result.method, RecoveryMethod::Context);
    assert!((result.confidence - 0.75).abs() < 1e-9);

    let strict = TieredMatcher::new(MatcherConfig {
        context_threshold: 0.7501,
        ..MatcherConfig::default()
    });
    let result = strict.match_text(&span, text, chunks).unwrap();
    assert!(!result.found);
    assert_eq!(result.method, RecoveryMethod::Lost);
    assert_eq!(result.char_range, None);

    let statuses: Vec<(RecoveryMethod, AttemptStatus)> =
        result.attempts.iter().map(|a| (a.method, a.status)).collect();
    assert_eq!(
        statuses,
        vec![
            (RecoveryMethod::Exact, AttemptStatus::Rejected),
            (RecoveryMethod::Context, AttemptStatus::Rejected),
            (RecoveryMethod::ChunkBounded, AttemptStatus::Skipped),
            (RecoveryMethod::Trigram, AttemptStatus::Rejected),
        ]
    );
    assert!((result.best_score() - 0.75).abs() < 1e-9);
}

#[test]
fn test_chunk_bounded_searches_the_origin_page() {
    // Six chunks on one page; the phrase moved from c0 into c4
    let text = format!("{}{}{}", filler(450), TYPO, filler(122));
    let chunks: Vec<Chunk> = (0..6)
        .map(|i| Chunk::new(format!("c{}", i), i * 100, (i + 1) * 100).with_pages(1, 1))
        .collect();
    let span = Span::from_range(PHRASE, "", "", CharRange::new(10, 39)).with_origin_chunk("c0");

    let result = TieredMatcher::new(MatcherConfig::default())
        .match_text(&span, &text, chunks)
        .unwrap();

    assert!(result.found);
    assert_eq!(result.method, RecoveryMethod::ChunkBounded);
    assert_eq!(result.scope, Some(ScopeKind::Region));
    assert_eq!(result.char_range.map(|r| r.start), Some(450));
    assert_eq!(result.matched_chunk_id.as_deref(), Some("c4"));
}

#[test]
fn test_trigram_fallback_without_hints() {
    let text = format!("{}{}{}", filler(250), TYPO, filler(122));
    let chunks = vec![
        Chunk::new("c0", 0, 150),
        Chunk::new("c1", 150, 300),
        Chunk::new("c2", 300, 400),
    ];
    // Origin range no longer exists in the new text
    let span = Span::from_range(PHRASE, "", "", CharRange::new(5000, 5029));

    let result = TieredMatcher::new(MatcherConfig::default())
        .match_text(&span, &text, chunks)
        .unwrap();

    assert!(result.found);
    assert_eq!(result.method, RecoveryMethod::Trigram);
    assert_eq!(result.scope, Some(ScopeKind::Shortlist));
    assert_eq!(result.char_range.map(|r| r.start), Some(250));
    assert_eq!(result.matched_chunk_id.as_deref(), Some("c1"));
    assert!(result.confidence > 0.9);
}

#[test]
fn test_typography_folding() {
    let matcher = TieredMatcher::new(MatcherConfig {
        fold_typography: true,
        ..MatcherConfig::default()
    });

    let text = "He called it \u{201C}the rhizome\u{201D} in 1980.";
    let span = Span::from_range("\"the rhizome\"", "", "", CharRange::new(13, 26));
    let result = matcher
        .match_text(&span, text, vec![Chunk::new("c0", 0, text.chars().count())])
        .unwrap();
    assert_eq!(result.method, RecoveryMethod::Exact);
    assert_eq!(result.char_range, Some(CharRange::new(13, 26)));

    let text = "The rhi-\nzome opposes hierarchy.";
    let span = Span::from_range("rhizome opposes", "", "", CharRange::new(4, 19));
    let result = matcher
        .match_text(&span, text, vec![Chunk::new("c0", 0, text.chars().count())])
        .unwrap();
    assert_eq!(result.method, RecoveryMethod::Exact);
    assert_eq!(result.char_range, Some(CharRange::new(4, 21)));
}

#[test]
fn test_folding_off_keeps_quotes_distinct() {
    let text = "He called it \u{201C}the rhizome\u{201D} in 1980.";
    let span = Span::from_range("\"the rhizome\"", "", "", CharRange::new(13, 26));
    let result = TieredMatcher::new(MatcherConfig::default())
        .match_text(&span, text, vec![Chunk::new("c0", 0, text.chars().count())])
        .unwrap();
    assert_ne!(result.method, RecoveryMethod::Exact);
}

#[test]
fn test_overlapping_chunks_are_rejected() {
    let span = Span::from_range("rhizome", "", "", CharRange::new(4, 11));
    let err = TieredMatcher::new(MatcherConfig::default())
        .match_text(
            &span,
            "the rhizome opposes hierarchy",
            vec![Chunk::new("a", 0, 15), Chunk::new("b", 10, 29)],
        )
        .unwrap_err();
    assert!(matches!(err, AnchorError::InvariantViolation(_)));
}

#[test]
fn test_text_moved_off_origin_page_is_found_by_trigrams() {
    // c0..c3 on page 1, c4..c7 on page 2; the phrase moved from c0 into c7
    let text = format!("{}{}{}", filler(720), TYPO, filler(52));
    let chunks: Vec<Chunk> = (0..8)
        .map(|i| {
            let page = if i < 4 { 1 } else { 2 };
            Chunk::new(format!("c{}", i), i * 100, (i + 1) * 100).with_pages(page, page)
        })
        .collect();
    let span = Span::from_range(PHRASE, "", "", CharRange::new(10, 39)).with_origin_chunk("c0");

    let result = TieredMatcher::new(MatcherConfig::default())
        .match_text(&span, &text, chunks)
        .unwrap();

    assert!(result.found);
    assert_eq!(result.method, RecoveryMethod::Trigram);
    assert_eq!(result.scope, Some(ScopeKind::Shortlist));
    assert_eq!(result.char_range.map(|r| r.start), Some(720));
    assert_eq!(result.matched_chunk_id.as_deref(), Some("c7"));

    let statuses: Vec<AttemptStatus> = result.attempts.iter().map(|a| a.status).collect();
    assert_eq!(
        statuses,
        vec![
            AttemptStatus::Rejected,
            AttemptStatus::Rejected,
            AttemptStatus::Rejected,
            AttemptStatus::Accepted,
        ]
    );
}

//! Coordinate Bridge Integration Tests
//!
//! Tests for moving selections between the paginated and the flat-text
//! representations of one document.

use anchorkit::bridge::{CoordinateBridge, GeometryLocation, GeometrySelection};
use anchorkit::domain::{CharRange, Chunk, ChunkBox, Rect, RecoveryMethod};
use anchorkit::matching::{ScopeKind, TieredMatcher};

const PHRASE: &str = "lines of flight";

fn column() -> String {
    let filler: String = "Plateaus connect without a center. "
        .chars()
        .cycle()
        .take(85)
        .collect();
    format!("{}{}{}", &filler[..40], PHRASE, &filler[40..])
}

/// One page, two columns with identical text
fn two_columns() -> (String, Vec<Chunk>) {
    let text = format!("{}{}", column(), column());
    let chunks = vec![
        Chunk::new("left", 0, 100)
            .with_pages(3, 3)
            .with_char_span(10, 90)
            .with_bboxes(vec![ChunkBox { page: 3, l: 50.0, t: 100.0, r: 290.0, b: 400.0 }]),
        Chunk::new("right", 100, 200)
            .with_pages(3, 3)
            .with_char_span(110, 190)
            .with_bboxes(vec![ChunkBox { page: 3, l: 310.0, t: 100.0, r: 550.0, b: 400.0 }]),
    ];
    (text, chunks)
}

#[test]
fn test_selection_rects_pick_the_column() {
    let (text, chunks) = two_columns();
    assert_eq!(text.chars().count(), 200);

    let matcher = TieredMatcher::default();
    let index = matcher.index(&text, chunks).unwrap();
    let bridge = CoordinateBridge::new(&matcher, &index);

    let right = GeometrySelection::new(PHRASE).with_rects(vec![Rect::new(320.0, 220.0, 100.0, 12.0)]);
    let result = bridge.to_flat_offset(&right, 3);
    assert_eq!(result.method, RecoveryMethod::Exact);
    assert_eq!(result.scope, Some(ScopeKind::CharSpan));
    assert_eq!(result.char_range, Some(CharRange::new(140, 155)));
    assert_eq!(result.matched_chunk_id.as_deref(), Some("right"));

    let left = GeometrySelection::new(PHRASE).with_rects(vec![Rect::new(60.0, 220.0, 100.0, 12.0)]);
    let result = bridge.to_flat_offset(&left, 3);
    assert_eq!(result.char_range, Some(CharRange::new(40, 55)));
    assert_eq!(result.matched_chunk_id.as_deref(), Some("left"));
}

#[test]
fn test_flat_range_maps_back_to_its_column() {
    let (text, chunks) = two_columns();
    let matcher = TieredMatcher::default();
    let index = matcher.index(&text, chunks).unwrap();
    let bridge = CoordinateBridge::new(&matcher, &index);

    match bridge.to_geometry(&CharRange::new(140, 155)) {
        GeometryLocation::Precise { page, rects } => {
            assert_eq!(page, 3);
            assert_eq!(rects.len(), 1);
            assert!((rects[0].x - 310.0).abs() < 1e-9);
            // 40% into a 300-unit tall box
            assert!((rects[0].y - 220.0).abs() < 1e-9);
            assert!((rects[0].h - 45.0).abs() < 1e-9);
        }
        other => panic!("expected precise geometry, got {:?}", other),
    }
}

#[test]
fn test_wrong_page_still_finds_text() {
    let (text, chunks) = two_columns();
    let matcher = TieredMatcher::default();
    let index = matcher.index(&text, chunks).unwrap();
    let bridge = CoordinateBridge::new(&matcher, &index);

    let result = bridge.to_flat_offset(&GeometrySelection::new(PHRASE), 9);
    assert!(result.found);
    assert_eq!(result.scope, Some(ScopeKind::Document));
    // First occurrence wins without any other hint
    assert_eq!(result.char_range, Some(CharRange::new(40, 55)));
}

#[test]
fn test_page_only_and_not_found() {
    let text = "a".repeat(300);
    let chunks = vec![
        Chunk::new("p4", 0, 100).with_pages(4, 5),
        Chunk::new("loose", 100, 200),
    ];
    let matcher = TieredMatcher::default();
    let index = matcher.index(&text, chunks).unwrap();
    let bridge = CoordinateBridge::new(&matcher, &index);

    assert_eq!(
        bridge.to_geometry(&CharRange::new(10, 20)),
        GeometryLocation::PageOnly { page: 4 }
    );
    assert_eq!(
        bridge.to_geometry(&CharRange::new(75, 80)),
        GeometryLocation::PageOnly { page: 5 }
    );
    assert_eq!(bridge.to_geometry(&CharRange::new(120, 130)), GeometryLocation::NotFound);
    assert_eq!(bridge.to_geometry(&CharRange::new(250, 260)), GeometryLocation::NotFound);
    assert_eq!(bridge.to_geometry(&CharRange::new(250, 260)).page(), None);
}

#[test]
fn test_geometry_location_serializes_with_kind_tag() {
    let json = serde_json::to_value(GeometryLocation::PageOnly { page: 2 }).unwrap();
    assert_eq!(json["kind"], "page_only");
    assert_eq!(json["page"], 2);
}

#[test]
fn test_range_across_chunk_boundary_keeps_both_slices() {
    let text = "b".repeat(200);
    let chunks = vec![
        Chunk::new("upper", 0, 100)
            .with_pages(1, 1)
            .with_bboxes(vec![ChunkBox { page: 1, l: 50.0, t: 0.0, r: 550.0, b: 100.0 }]),
        Chunk::new("lower", 100, 200)
            .with_pages(1, 1)
            .with_bboxes(vec![ChunkBox { page: 1, l: 50.0, t: 200.0, r: 550.0, b: 300.0 }]),
    ];
    let matcher = TieredMatcher::default();
    let index = matcher.index(&text, chunks).unwrap();
    let bridge = CoordinateBridge::new(&matcher, &index);

    match bridge.to_geometry(&CharRange::new(50, 150)) {
        GeometryLocation::Precise { page, rects } => {
            assert_eq!(page, 1);
            assert_eq!(rects.len(), 2);
            assert!((rects[0].y - 50.0).abs() < 1e-9);
            assert!((rects[0].h - 50.0).abs() < 1e-9);
            assert!((rects[1].y - 200.0).abs() < 1e-9);
            assert!((rects[1].h - 50.0).abs() < 1e-9);
        }
        other => panic!("expected precise geometry, got {:?}", other),
    }
}

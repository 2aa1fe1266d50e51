//! Flat-text range to paginated location.

use serde::{Deserialize, Serialize};

use crate::domain::{CharRange, Chunk, ChunkBox, Rect};

/// Paginated location of a flat-text range.
///
/// `PageOnly` is a valid, imprecise answer and not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryLocation {
    Precise { page: u32, rects: Vec<Rect> },
    PageOnly { page: u32 },
    NotFound,
}

impl GeometryLocation {
    pub fn page(&self) -> Option<u32> {
        match self {
            GeometryLocation::Precise { page, .. } | GeometryLocation::PageOnly { page } => {
                Some(*page)
            }
            GeometryLocation::NotFound => None,
        }
    }
}

/// Locate `range` on the page.
///
/// The chunk holding the start of the range decides the page. Each chunk's
/// bounding boxes are treated as one reading-order strip weighted by box
/// height; the part of the range inside that chunk is interpolated onto the
/// strip. Slices from every chunk the range covers are returned as long as
/// they fall on the start page.
pub fn to_geometry(range: &CharRange, chunks: &[Chunk]) -> GeometryLocation {
    let mut covered: Vec<&Chunk> = chunks
        .iter()
        .filter(|c| c.range().contains(range.start) || c.range().overlaps(range))
        .collect();
    covered.sort_by_key(|c| c.char_start);

    let Some((first, rest)) = covered.split_first() else {
        return GeometryLocation::NotFound;
    };

    let (from, to) = chunk_fraction(range, first);
    let Some((page, mut rects)) = interpolate_boxes(&first.bboxes, from, to, None) else {
        return match first.pages() {
            Some((first_page, last_page)) => {
                let span = f64::from(last_page - first_page + 1);
                let offset = (from * span).floor() as u32;
                GeometryLocation::PageOnly {
                    page: (first_page + offset).min(last_page),
                }
            }
            None => GeometryLocation::NotFound,
        };
    };

    for chunk in rest {
        let (from, to) = chunk_fraction(range, chunk);
        if let Some((_, more)) = interpolate_boxes(&chunk.bboxes, from, to, Some(page)) {
            rects.extend(more);
        }
    }

    GeometryLocation::Precise { page, rects }
}

/// Fraction `[from, to]` of `chunk` covered by `range`
fn chunk_fraction(range: &CharRange, chunk: &Chunk) -> (f64, f64) {
    let chunk_len = chunk.len().max(1) as f64;
    let start = range.start.clamp(chunk.char_start, chunk.char_end);
    let end = range.end.clamp(start, chunk.char_end);
    (
        (start - chunk.char_start) as f64 / chunk_len,
        (end - chunk.char_start) as f64 / chunk_len,
    )
}

/// Slices of `boxes` covering the fraction `[from, to]` of their combined
/// height, restricted to `page` or else to the page where `from` lands
fn interpolate_boxes(
    boxes: &[ChunkBox],
    from: f64,
    to: f64,
    page: Option<u32>,
) -> Option<(u32, Vec<Rect>)> {
    let total: f64 = boxes.iter().map(|b| b.height().max(0.0)).sum();
    if boxes.is_empty() || total <= 0.0 {
        return None;
    }

    let lo = from * total;
    let hi = to.max(from) * total;

    let page = page.unwrap_or_else(|| {
        // Page of the box where the range starts
        let mut cursor = 0.0;
        for b in boxes {
            let h = b.height().max(0.0);
            if h > 0.0 && lo < cursor + h {
                return b.page;
            }
            cursor += h;
        }
        boxes[boxes.len() - 1].page
    });

    let mut rects = Vec::new();
    let mut cursor = 0.0;
    for b in boxes {
        let h = b.height().max(0.0);
        let (box_lo, box_hi) = (cursor, cursor + h);
        cursor += h;
        if b.page != page || h <= 0.0 {
            continue;
        }
        let slice_lo = lo.max(box_lo);
        let slice_hi = hi.min(box_hi);
        let collapsed = slice_hi <= slice_lo;
        if collapsed && !(lo >= box_lo && lo < box_hi) {
            continue;
        }
        let top = b.top() + (slice_lo - box_lo);
        let height = if collapsed { 0.0 } else { slice_hi - slice_lo };
        rects.push(Rect::new(b.left(), top, b.right() - b.left(), height));
    }

    Some((page, rects))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed_chunk() -> Chunk {
        Chunk::new("c", 100, 200).with_pages(3, 4).with_bboxes(vec![
            ChunkBox { page: 3, l: 10.0, t: 700.0, r: 110.0, b: 760.0 },
            ChunkBox { page: 4, l: 10.0, t: 40.0, r: 110.0, b: 80.0 },
        ])
    }

    #[test]
    fn test_interpolates_inside_first_box() {
        // 60 + 40 height units; chars 100..130 cover the first 30%
        let location = to_geometry(&CharRange::new(100, 130), &[boxed_chunk()]);
        match location {
            GeometryLocation::Precise { page, rects } => {
                assert_eq!(page, 3);
                assert_eq!(rects.len(), 1);
                assert!((rects[0].y - 700.0).abs() < 1e-9);
                assert!((rects[0].h - 30.0).abs() < 1e-9);
                assert!((rects[0].w - 100.0).abs() < 1e-9);
            }
            other => panic!("expected precise geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_start_page_decides() {
        // 70%..90% lands in the page-4 box
        let location = to_geometry(&CharRange::new(170, 190), &[boxed_chunk()]);
        match location {
            GeometryLocation::Precise { page, rects } => {
                assert_eq!(page, 4);
                assert!((rects[0].y - 50.0).abs() < 1e-9);
                assert!((rects[0].h - 20.0).abs() < 1e-9);
            }
            other => panic!("expected precise geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_later_chunks_stay_on_the_start_page() {
        // Second chunk continues on page 4; only its page-3 box counts
        let next = Chunk::new("d", 200, 300).with_pages(3, 4).with_bboxes(vec![
            ChunkBox { page: 3, l: 10.0, t: 760.0, r: 110.0, b: 780.0 },
            ChunkBox { page: 4, l: 10.0, t: 40.0, r: 110.0, b: 120.0 },
        ]);
        let location = to_geometry(&CharRange::new(100, 260), &[next, boxed_chunk()]);
        match location {
            GeometryLocation::Precise { page, rects } => {
                assert_eq!(page, 3);
                assert_eq!(rects.len(), 2);
                assert!((rects[0].y - 700.0).abs() < 1e-9);
                assert!((rects[0].h - 60.0).abs() < 1e-9);
                assert!((rects[1].y - 760.0).abs() < 1e-9);
                assert!((rects[1].h - 20.0).abs() < 1e-9);
            }
            other => panic!("expected precise geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_page_only_without_boxes() {
        let chunk = Chunk::new("c", 0, 100).with_pages(5, 6);
        assert_eq!(
            to_geometry(&CharRange::new(10, 20), &[chunk.clone()]),
            GeometryLocation::PageOnly { page: 5 }
        );
        assert_eq!(
            to_geometry(&CharRange::new(60, 70), &[chunk]),
            GeometryLocation::PageOnly { page: 6 }
        );
    }

    #[test]
    fn test_not_found_outside_chunks() {
        let chunk = Chunk::new("c", 0, 100).with_pages(1, 1);
        assert_eq!(to_geometry(&CharRange::new(150, 160), &[chunk]), GeometryLocation::NotFound);
        let pageless = Chunk::new("c", 0, 100);
        assert_eq!(to_geometry(&CharRange::new(10, 20), &[pageless]), GeometryLocation::NotFound);
    }
}

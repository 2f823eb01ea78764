//! Finding the pairing candidate for a dragged token.
//!
//! The nearest other pairable token (by anchor distance) wins, but only if it
//! is within [`MAX_PAIR_DISTANCE`] and its bounding box actually overlaps the
//! dragged token's. Distance alone would accept large chips that are close
//! but not touching.

use crate::token::{TokenId, TokenSet};
use kurbo::{Point, Rect};

/// Maximum anchor distance for a pairing candidate, in surface pixels.
pub const MAX_PAIR_DISTANCE: f64 = 400.0;

/// Strict overlap test: rectangles that only share an edge do not overlap.
pub fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && a.x1 > b.x0 && a.y0 < b.y1 && a.y1 > b.y0
}

/// Find the candidate for a token at its current position.
pub fn find_candidate(tokens: &TokenSet, subject: TokenId, max_distance: f64) -> Option<TokenId> {
    let token = tokens.get(subject)?;
    candidate_at(tokens, subject, token.position, token.bounds(), max_distance)
}

/// Find the candidate for `subject` as if it were placed at `anchor` with `bounds`.
pub fn candidate_at(
    tokens: &TokenSet,
    subject: TokenId,
    anchor: Point,
    bounds: Rect,
    max_distance: f64,
) -> Option<TokenId> {
    let mut closest = None;
    let mut closest_distance = f64::INFINITY;

    for other in tokens.iter() {
        if other.id() == subject || other.is_pairing() {
            continue;
        }
        let distance = anchor.distance(other.position);
        if distance < closest_distance {
            closest_distance = distance;
            closest = Some(other);
        }
    }

    let closest = closest?;
    if closest_distance > max_distance {
        return None;
    }
    overlaps(bounds, closest.bounds()).then(|| closest.id())
}

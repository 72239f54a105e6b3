//! Utility functions for bounding rectangles and planar measurements
//!
//! All values are in coordinate degrees, treating longitude and latitude as a plane.

use geo::{BoundingRect, Coord, Euclidean, Length, LineString, MultiLineString, Rect};

/// Bounding rectangle of a line, grown by `margin` on every side
#[inline]
pub fn expanded_rect(line: &LineString<f64>, margin: f64) -> Option<Rect<f64>> {
    line.bounding_rect().map(|rect| expand_rect(rect, margin))
}

/// Grow a rectangle by `margin` on every side
#[inline(always)]
pub fn expand_rect(rect: Rect<f64>, margin: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: rect.min().x - margin,
            y: rect.min().y - margin,
        },
        Coord {
            x: rect.max().x + margin,
            y: rect.max().y + margin,
        },
    )
}

/// Check whether two rectangles overlap (touching edges count)
#[inline(always)]
pub fn rects_intersect(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x
        && b.min().x <= a.max().x
        && a.min().y <= b.max().y
        && b.min().y <= a.max().y
}

/// Planar length of a line in degrees
pub fn planar_length(line: &LineString<f64>) -> f64 {
    Euclidean.length(line)
}

/// Planar length of several lines in degrees
pub fn total_planar_length(lines: &[LineString<f64>]) -> f64 {
    lines.iter().map(planar_length).sum()
}

/// Check that every coordinate of the lines is finite
#[inline]
pub fn all_finite(lines: &MultiLineString<f64>) -> bool {
    lines
        .0
        .iter()
        .flat_map(|line| line.0.iter())
        .all(|c| c.x.is_finite() && c.y.is_finite())
}

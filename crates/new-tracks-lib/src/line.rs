//! Planar line construction from decoded trip paths

use crate::codec;
use geo::{Coord, LineString};

/// Build a planar line from (lon, lat) points
///
/// Requires at least 2 finite points, not all identical. Points are kept as given:
/// no deduplication or simplification, so the result may self-intersect or
/// repeat vertices.
pub fn build_line(points: Vec<Coord<f64>>) -> Option<LineString<f64>> {
    if points.len() < 2 {
        return None;
    }
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return None;
    }
    let first = points[0];
    if points.iter().all(|p| *p == first) {
        return None;
    }

    Some(LineString::new(points))
}

/// Decode a serialized path and build its line in one step
#[inline]
pub fn decode_line(path: &str) -> Option<LineString<f64>> {
    codec::decode(path).and_then(build_line)
}

//! Results of subtracting historical regions from a candidate line

use geo::{Geometry, GeometryCollection, LineString, MultiLineString};

/// Geometry left over after a subtraction
///
/// Mirrors the shapes a geometric difference can produce. Non-line members of a
/// [`Remainder::Mixed`] collection are artifacts and never reach the output.
#[derive(Debug, Clone, PartialEq)]
pub enum Remainder {
    /// Nothing left
    Empty,
    /// A single simple line
    Line(LineString<f64>),
    /// Several disjoint lines, in the order the subtraction produced them
    MultiLine(MultiLineString<f64>),
    /// Any mix of geometry kinds
    Mixed(GeometryCollection<f64>),
}

impl Remainder {
    /// Normalize a multi-line result: no parts is empty, one part is a line
    pub fn from_lines(mut lines: MultiLineString<f64>) -> Self {
        match lines.0.len() {
            0 => Remainder::Empty,
            1 => lines.0.pop().map_or(Remainder::Empty, Remainder::Line),
            _ => Remainder::MultiLine(lines),
        }
    }

    /// Whether no geometry is left at all
    pub fn is_empty(&self) -> bool {
        match self {
            Remainder::Empty => true,
            Remainder::Line(line) => line.0.is_empty(),
            Remainder::MultiLine(lines) => lines.0.iter().all(|l| l.0.is_empty()),
            Remainder::Mixed(collection) => collection.0.is_empty(),
        }
    }
}

impl From<Geometry<f64>> for Remainder {
    fn from(geometry: Geometry<f64>) -> Self {
        match geometry {
            Geometry::LineString(line) => Remainder::Line(line),
            Geometry::MultiLineString(lines) => Remainder::MultiLine(lines),
            Geometry::GeometryCollection(collection) => Remainder::Mixed(collection),
            other => Remainder::Mixed(GeometryCollection::new_from(vec![other])),
        }
    }
}

/// Flatten a remainder into simple lines
///
/// Line and multi-line members of mixed collections are kept (recursively through
/// nested collections), every other geometry kind is discarded.
pub fn flatten(remainder: Remainder) -> Vec<LineString<f64>> {
    match remainder {
        Remainder::Empty => Vec::new(),
        Remainder::Line(line) => vec![line],
        Remainder::MultiLine(lines) => lines.0,
        Remainder::Mixed(collection) => {
            let mut out = Vec::new();
            for geometry in collection {
                collect_lines(geometry, &mut out);
            }
            out
        }
    }
}

fn collect_lines(geometry: Geometry<f64>, out: &mut Vec<LineString<f64>>) {
    match geometry {
        Geometry::LineString(line) => out.push(line),
        Geometry::Line(segment) => out.push(LineString::new(vec![segment.start, segment.end])),
        Geometry::MultiLineString(lines) => out.extend(lines.0),
        Geometry::GeometryCollection(collection) => {
            for inner in collection {
                collect_lines(inner, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, Line, Point, Polygon, line_string};

    fn test_line(x: f64) -> LineString<f64> {
        line_string![(x: x, y: 0.0), (x: x, y: 1.0)]
    }

    #[test]
    fn test_flatten_empty() {
        assert!(flatten(Remainder::Empty).is_empty());
    }

    #[test]
    fn test_flatten_single_line() {
        let line = test_line(0.0);
        assert_eq!(flatten(Remainder::Line(line.clone())), vec![line]);
    }

    #[test]
    fn test_flatten_multi_line_preserves_order() {
        let lines: Vec<_> = (0..4).map(|i| test_line(i as f64)).collect();
        let flat = flatten(Remainder::MultiLine(MultiLineString::new(lines.clone())));
        assert_eq!(flat, lines);
    }

    #[test]
    fn test_flatten_mixed_discards_other_kinds() {
        let nested = GeometryCollection::new_from(vec![
            Geometry::LineString(test_line(3.0)),
            Geometry::Point(Point::new(9.0, 9.0)),
        ]);
        let collection = GeometryCollection::new_from(vec![
            Geometry::Point(Point::new(5.0, 5.0)),
            Geometry::LineString(test_line(0.0)),
            Geometry::Polygon(Polygon::new(
                line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)],
                vec![],
            )),
            Geometry::MultiLineString(MultiLineString::new(vec![test_line(1.0), test_line(2.0)])),
            Geometry::GeometryCollection(nested),
        ]);

        let flat = flatten(Remainder::Mixed(collection));
        assert_eq!(
            flat,
            vec![test_line(0.0), test_line(1.0), test_line(2.0), test_line(3.0)]
        );
    }

    #[test]
    fn test_flatten_segment_becomes_line() {
        let segment = Line::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
        let flat = flatten(Remainder::from(Geometry::Line(segment)));
        assert_eq!(flat, vec![line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]]);
    }

    #[test]
    fn test_from_lines_normalizes() {
        assert_eq!(Remainder::from_lines(MultiLineString::new(vec![])), Remainder::Empty);
        assert_eq!(
            Remainder::from_lines(MultiLineString::new(vec![test_line(0.0)])),
            Remainder::Line(test_line(0.0))
        );
        assert!(matches!(
            Remainder::from_lines(MultiLineString::new(vec![test_line(0.0), test_line(1.0)])),
            Remainder::MultiLine(_)
        ));
    }

    #[test]
    fn test_is_empty() {
        assert!(Remainder::Empty.is_empty());
        assert!(Remainder::Mixed(GeometryCollection::default()).is_empty());
        assert!(!Remainder::Line(test_line(0.0)).is_empty());
        assert!(!Remainder::from(Geometry::Point(Point::new(0.0, 0.0))).is_empty());
    }
}

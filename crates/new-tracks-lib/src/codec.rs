//! Path codec for trip routes
//!
//! Trip paths come in two serializations: the compact encoded polyline format
//! (precision 5, latitude first) and a literal JSON array of `[lon, lat]` pairs.
//! Decoding yields coordinates with `x` = longitude and `y` = latitude.

use geo::Coord;

/// Number of decimal digits kept by the compact polyline format
pub const POLYLINE_PRECISION: u32 = 5;

/// Reasons a path string could not be decoded or a point sequence encoded
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("polyline error: {0}")]
    Polyline(String),

    #[error("coordinate out of range: lat {lat}, lon {lon}")]
    OutOfRange { lat: f64, lon: f64 },

    #[error("JSON path error: {0}")]
    Json(String),

    #[error("need at least 2 points, got {0}")]
    TooFewPoints(usize),
}

impl From<polyline::errors::PolylineError> for CodecError {
    fn from(err: polyline::errors::PolylineError) -> Self {
        CodecError::Polyline(err.to_string())
    }
}

/// Decode a serialized trip path into ordered (lon, lat) coordinates
///
/// The compact polyline format is attempted first. If it fails and the trimmed
/// string starts with `[`, the string is parsed as a JSON coordinate array.
/// Returns `None` when neither format applies or fewer than 2 points result.
pub fn decode(path: &str) -> Option<Vec<Coord<f64>>> {
    if path.len() < 2 {
        return None;
    }

    let coords = match decode_polyline(path) {
        Ok(coords) => coords,
        Err(polyline_err) => {
            let trimmed = path.trim();
            if !trimmed.starts_with('[') {
                tracing::trace!("Path is not a polyline: {polyline_err}");
                return None;
            }
            match decode_json(trimmed) {
                Ok(coords) => coords,
                Err(json_err) => {
                    tracing::trace!("Path is neither polyline ({polyline_err}) nor JSON ({json_err})");
                    return None;
                }
            }
        }
    };

    (coords.len() >= 2).then_some(coords)
}

/// Encode (lon, lat) coordinates as a compact polyline string
pub fn encode(points: &[Coord<f64>]) -> Result<String, CodecError> {
    if points.len() < 2 {
        return Err(CodecError::TooFewPoints(points.len()));
    }
    Ok(polyline::encode_coordinates(
        points.iter().copied(),
        POLYLINE_PRECISION,
    )?)
}

/// Decode a compact polyline string (precision 5)
pub fn decode_polyline(encoded: &str) -> Result<Vec<Coord<f64>>, CodecError> {
    let line = polyline::decode_polyline(encoded, POLYLINE_PRECISION)?;

    if let Some(bad) = line
        .0
        .iter()
        .find(|c| !(-90.0..=90.0).contains(&c.y) || !(-180.0..=180.0).contains(&c.x))
    {
        return Err(CodecError::OutOfRange {
            lat: bad.y,
            lon: bad.x,
        });
    }

    Ok(line.0)
}

/// Decode a JSON array of `[lon, lat, ...]` tuples
pub fn decode_json(text: &str) -> Result<Vec<Coord<f64>>, CodecError> {
    let raw: Vec<Vec<f64>> =
        serde_json::from_str(text).map_err(|e| CodecError::Json(e.to_string()))?;

    raw.into_iter()
        .map(|pair| match pair.as_slice() {
            [lon, lat, ..] => Ok(Coord { x: *lon, y: *lat }),
            _ => Err(CodecError::Json(format!(
                "expected [lon, lat], got {} components",
                pair.len()
            ))),
        })
        .collect()
}

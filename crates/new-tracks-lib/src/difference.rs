//! Difference engine - subtracting buffered historical lines from a candidate
//!
//! The candidate is reduced one historical line at a time instead of subtracting a single
//! union of all historical buffers. This never materializes a buffer over the whole
//! history, at the cost of O(candidates × history) subtractions; a bounding rectangle
//! prefilter skips historical lines that cannot touch the current remainder.

use crate::geometry::Remainder;
use crate::{DataError, Result, utils};
use geo::{BooleanOps, BoundingRect, Buffer, LineString, MultiLineString, MultiPolygon, Rect};
use rayon::prelude::*;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default buffer radius in coordinate degrees (roughly 150 m of latitude)
pub const DEFAULT_TOLERANCE: f64 = 0.0015;

/// Smallest buffer radius actually used, in degrees
///
/// Matches the precision of the compact polyline format. A zero tolerance still
/// needs a region with some area to remove a line lying exactly on a historical one.
pub const MIN_BUFFER_RADIUS: f64 = 1e-5;

/// When buffered historical regions are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BufferStrategy {
    /// Buffer each historical line again for every candidate (bounded memory)
    #[default]
    PerCandidate,
    /// Buffer every historical line once, up front, and keep the regions
    Cached,
}

/// Configuration of the difference computation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DifferenceConfig {
    /// Buffer radius around historical lines, in coordinate degrees
    pub tolerance: f64,
    /// Whether buffered regions are cached across candidates
    pub strategy: BufferStrategy,
}

impl Default for DifferenceConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            strategy: BufferStrategy::default(),
        }
    }
}

impl DifferenceConfig {
    /// Radius actually used for buffering
    #[inline]
    pub fn buffer_radius(&self) -> f64 {
        self.tolerance.max(MIN_BUFFER_RADIUS)
    }
}

/// One historical line with its precomputed reach
#[derive(Debug, Clone)]
struct HistoricalLine {
    line: LineString<f64>,
    /// Bounding rectangle of the buffered region
    reach: Rect<f64>,
    /// Buffered region, present only with [`BufferStrategy::Cached`]
    region: Option<MultiPolygon<f64>>,
}

impl HistoricalLine {
    /// Remove the part of `remainder` that lies within this line's buffer
    fn subtract_from(&self, remainder: MultiLineString<f64>, radius: f64) -> MultiLineString<f64> {
        let Some(rect) = remainder.bounding_rect() else {
            return remainder;
        };
        if !utils::rects_intersect(&rect, &self.reach) {
            return remainder;
        }

        let clipped = match &self.region {
            Some(region) => region.clip(&remainder, true),
            None => self.line.buffer(radius).clip(&remainder, true),
        };

        // Zero-length pieces are where the remainder only grazed the region boundary
        MultiLineString::new(
            clipped
                .0
                .into_iter()
                .filter(|piece| utils::planar_length(piece) > 0.0)
                .collect(),
        )
    }
}

/// Read-only collection of historical lines, shared across all candidates
#[derive(Debug, Clone)]
pub struct History {
    lines: Vec<HistoricalLine>,
    radius: f64,
    strategy: BufferStrategy,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl History {
    /// Prepare historical lines for subtraction
    ///
    /// With [`BufferStrategy::Cached`] every line is buffered here, in parallel.
    /// Lines without any point are ignored. Iteration order is the given order.
    pub fn new(lines: Vec<LineString<f64>>, config: &DifferenceConfig) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("history::new");

        let radius = config.buffer_radius();
        let strategy = config.strategy;

        let lines: Vec<HistoricalLine> = lines
            .into_par_iter()
            .filter_map(|line| {
                let reach = utils::expanded_rect(&line, radius)?;
                let region = match strategy {
                    BufferStrategy::Cached => Some(line.buffer(radius)),
                    BufferStrategy::PerCandidate => None,
                };
                Some(HistoricalLine {
                    line,
                    reach,
                    region,
                })
            })
            .collect();

        if strategy == BufferStrategy::Cached {
            tracing::debug!("Cached {} buffered historical regions", lines.len());
        }

        Self {
            lines,
            radius,
            strategy,
        }
    }

    /// Number of historical lines
    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if there is no history at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Buffer radius in use, in degrees
    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Buffer strategy in use
    #[inline]
    pub fn strategy(&self) -> BufferStrategy {
        self.strategy
    }

    /// Compute the part of `candidate` not within the buffer of any historical line
    ///
    /// Without history the candidate is returned unchanged. A failure inside the
    /// geometry kernel is reported as [`DataError::Geometry`] for this candidate only.
    pub fn remaining(&self, candidate: &LineString<f64>) -> Result<Remainder> {
        #[cfg(feature = "profiling")]
        profiling::scope!("history::remaining");

        if self.lines.is_empty() {
            return Ok(Remainder::Line(candidate.clone()));
        }

        let start = MultiLineString::new(vec![candidate.clone()]);
        if !utils::all_finite(&start) {
            return Err(DataError::Geometry(
                "candidate has non-finite coordinates".to_string(),
            ));
        }

        panic::catch_unwind(AssertUnwindSafe(|| self.subtract_all(start)))
            .map(Remainder::from_lines)
            .map_err(|payload| DataError::Geometry(panic_message(payload.as_ref())))
    }

    /// Fold the history over the remainder, stopping once nothing is left
    fn subtract_all(&self, start: MultiLineString<f64>) -> MultiLineString<f64> {
        let folded = self.lines.iter().try_fold(start, |remainder, historical| {
            if remainder.0.is_empty() {
                ControlFlow::Break(remainder)
            } else {
                ControlFlow::Continue(historical.subtract_from(remainder, self.radius))
            }
        });

        match folded {
            ControlFlow::Break(remainder) | ControlFlow::Continue(remainder) => remainder,
        }
    }
}

/// Compute the part of `candidate` farther than `tolerance` from every line of `history`
///
/// Convenience wrapper that buffers per call; use [`History`] to share the
/// historical set across many candidates.
pub fn remaining(
    candidate: &LineString<f64>,
    history: &[LineString<f64>],
    tolerance: f64,
) -> Result<Remainder> {
    let config = DifferenceConfig {
        tolerance,
        strategy: BufferStrategy::PerCandidate,
    };
    History::new(history.to_vec(), &config).remaining(candidate)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("geometry kernel panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("geometry kernel panicked: {message}")
    } else {
        "geometry kernel panicked".to_string()
    }
}

//! Pipeline - Top-level driver from trip table to exported fragments
//!
//! Filters trips by type, splits them at the cutoff into historical and new sets,
//! subtracts the historical lines from every new line in parallel, and turns the
//! remaining fragments back into trip rows.

use crate::difference::{DifferenceConfig, History};
use crate::geometry::{Remainder, flatten};
use crate::line::decode_line;
use crate::trip::{DatedTrip, Schema, Trip, TripTable, attach, ensure_output_available, write_rows};
use crate::Result;

use chrono::{Datelike, NaiveDateTime};
use csv::StringRecord;
use geo::LineString;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of progress messages emitted over a difference run
const PROGRESS_STEPS: usize = 20;

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Trip types to keep; every other row is dropped before any geometric work
    pub trip_types: Vec<String>,
    /// Buffer tolerance and caching strategy
    pub difference: DifferenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trip_types: vec!["train".to_string()],
            difference: DifferenceConfig::default(),
        }
    }
}

/// Counts gathered at each stage of a run
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunSummary {
    /// Rows in the input file
    pub records_loaded: usize,
    /// Rows whose type is selected
    pub records_matching_type: usize,
    /// Selected rows whose start timestamp parsed
    pub records_with_valid_dates: usize,
    /// Dated trips strictly before the cutoff
    pub historical_trips: usize,
    /// Dated trips on or after the cutoff
    pub new_trips: usize,
    /// First and last year of the historical trips
    pub historical_year_range: Option<(i32, i32)>,
    /// New trips with a decodable path
    pub valid_new_lines: usize,
    /// Historical trips with a decodable path
    pub valid_historical_lines: usize,
    /// New trips skipped because their difference failed
    pub failed_candidates: usize,
    /// Line fragments left after subtraction
    pub fragments: usize,
    /// Rows written to the output
    pub rows_written: usize,
}

/// Batch driver holding the run configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Pipeline {
    /// Create a pipeline with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get a reference to the configuration
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read `input`, find the new fragments since `since` and write them to `output`
    ///
    /// Refuses to start if `output` already exists, and never overwrites it.
    pub fn run(&self, input: &Path, output: &Path, since: NaiveDateTime) -> Result<RunSummary> {
        #[cfg(feature = "profiling")]
        profiling::scope!("pipeline::run");

        ensure_output_available(output)?;
        let table = TripTable::from_path(input)?;

        let (schema, rows, mut summary) = self.process(table, since);
        summary.rows_written = write_rows(output, &schema, &rows)?;
        tracing::info!(
            "Wrote {} rows to '{}'",
            summary.rows_written,
            output.display()
        );

        Ok(summary)
    }

    /// Compute the output rows for an already loaded table
    ///
    /// Returns the schema to write the rows with, the rows in input order, and the
    /// stage counts (`rows_written` left at zero).
    pub fn process(
        &self,
        mut table: TripTable,
        since: NaiveDateTime,
    ) -> (Schema, Vec<StringRecord>, RunSummary) {
        let mut summary = RunSummary {
            records_loaded: table.len(),
            ..RunSummary::default()
        };
        tracing::info!("Total records loaded: {}", summary.records_loaded);

        table.retain_types(&self.config.trip_types);
        summary.records_matching_type = table.len();
        tracing::info!(
            "Records with trip type in {:?}: {}",
            self.config.trip_types,
            summary.records_matching_type
        );

        let (schema, dated) = table.into_dated();
        summary.records_with_valid_dates = dated.len();
        tracing::info!(
            "Records remaining after dropping invalid dates: {}",
            summary.records_with_valid_dates
        );

        let (history, new): (Vec<DatedTrip>, Vec<DatedTrip>) =
            dated.into_iter().partition(|d| d.start < since);
        summary.historical_trips = history.len();
        summary.new_trips = new.len();
        summary.historical_year_range = year_range(&history);
        tracing::info!(
            "Historical trips (before {since}): {}, new trips (on or after {since}): {}",
            summary.historical_trips,
            summary.new_trips
        );
        if let Some((first, last)) = summary.historical_year_range {
            tracing::info!("Historical year range: {first} to {last}");
        }

        let history_lines: Vec<LineString<f64>> = history
            .iter()
            .filter_map(|d| decoded_line(&d.trip, &schema))
            .collect();
        let candidates: Vec<(Trip, LineString<f64>)> = new
            .into_iter()
            .filter_map(|d| decoded_line(&d.trip, &schema).map(|line| (d.trip, line)))
            .collect();
        summary.valid_new_lines = candidates.len();
        summary.valid_historical_lines = history_lines.len();
        tracing::info!("Valid new lines: {}", summary.valid_new_lines);
        tracing::info!("Valid historical lines: {}", summary.valid_historical_lines);

        let history = History::new(history_lines, &self.config.difference);
        let remainders = self.compute_remainders(&history, &candidates);
        summary.failed_candidates = remainders.iter().filter(|r| r.is_none()).count();

        let mut rows = Vec::new();
        for ((trip, _), remainder) in candidates.iter().zip(remainders) {
            let Some(remainder) = remainder else {
                continue;
            };
            for fragment in flatten(remainder) {
                summary.fragments += 1;
                rows.extend(attach(&fragment, trip, &schema));
            }
        }
        tracing::info!("Found {} new unique route fragments", summary.fragments);
        if summary.failed_candidates > 0 {
            tracing::warn!(
                "{} new trips were skipped because their difference failed",
                summary.failed_candidates
            );
        }

        (schema, rows, summary)
    }

    /// Subtract the history from every candidate, in parallel, keeping input order
    ///
    /// A failed candidate yields `None` and is logged; it does not stop the others.
    fn compute_remainders(
        &self,
        history: &History,
        candidates: &[(Trip, LineString<f64>)],
    ) -> Vec<Option<Remainder>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("pipeline::compute_remainders");

        if history.is_empty() {
            tracing::info!("No historical data found. All new routes are considered new.");
        } else {
            tracing::info!(
                "Calculating difference of {} new lines against {} historical lines (buffer {} deg, {:?})",
                candidates.len(),
                history.len(),
                history.radius(),
                history.strategy()
            );
        }

        let total = candidates.len();
        let step = (total / PROGRESS_STEPS).max(1);
        let done = AtomicUsize::new(0);

        candidates
            .par_iter()
            .map(|(trip, line)| {
                let result = history.remaining(line);

                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % step == 0 || finished == total {
                    tracing::info!("Processed new trip {finished}/{total}");
                }

                match result {
                    Ok(remainder) => Some(remainder),
                    Err(e) => {
                        tracing::warn!("Skipping new trip at row {}: {e}", trip.row());
                        None
                    }
                }
            })
            .collect()
    }
}

/// Decode a trip's path, logging rows that do not decode
fn decoded_line(trip: &Trip, schema: &Schema) -> Option<LineString<f64>> {
    let line = decode_line(trip.path(schema));
    if line.is_none() {
        tracing::debug!("Row {}: path does not decode to a line", trip.row());
    }
    line
}

/// First and last year among the trips, `None` if there are none
fn year_range(trips: &[DatedTrip]) -> Option<(i32, i32)> {
    trips.iter().map(|d| d.start.year()).fold(None, |range, year| {
        Some(match range {
            None => (year, year),
            Some((first, last)) => (first.min(year), last.max(year)),
        })
    })
}

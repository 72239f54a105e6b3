//! New Tracks Library - Finding never-traveled route fragments
//!
//! Given a table of trips, each carrying an encoded path, this library splits the trips
//! at a cutoff timestamp into a historical set and a new set, and computes for every new
//! trip the parts of its route that lie outside a fixed-tolerance buffer around every
//! historical route. Each remaining fragment is re-attached to its trip's metadata for
//! export.
//!
//! # Architecture
//!
//! - **[`codec`]**: Compact polyline / JSON path decoding and polyline encoding
//! - **[`line`]**: Planar line construction from decoded points
//! - **[`History`]**: Buffered subtraction of historical lines from a candidate
//! - **[`Remainder`]**: Tagged union of subtraction results, flattened into simple lines
//! - **[`TripTable`]**: CSV loading, filtering and re-attachment of fragments to trips
//! - **[`Pipeline`]**: Batch driver, parallel over candidates
//!
//! # Performance Characteristics
//!
//! - **Difference**: O(C×H) buffer subtractions in the worst case (C=candidates,
//!   H=historical lines), reduced by a bounding rectangle prefilter
//! - **Memory**: O(N) for the loaded table, plus O(H) buffered regions when
//!   [`BufferStrategy::Cached`] is selected

pub mod codec;
mod difference;
mod geometry;
pub mod line;
mod pipeline;
mod trip;
pub mod utils;

// Public API exports
pub use codec::CodecError;
pub use difference::{
    BufferStrategy, DEFAULT_TOLERANCE, DifferenceConfig, History, MIN_BUFFER_RADIUS, remaining,
};
pub use geometry::{Remainder, flatten};
pub use pipeline::{Config, Pipeline, RunSummary};
pub use trip::{
    DatedTrip, Schema, Trip, TripTable, attach, ensure_output_available, parse_timestamp,
    parse_trip_types, write_rows, write_rows_to,
};

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Path encoding error: {0}")]
    Codec(#[from] CodecError),

    #[error("Output file '{}' already exists", .0.display())]
    OutputExists(std::path::PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DataError>;

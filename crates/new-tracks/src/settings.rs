use chrono::NaiveDateTime;
use clap::Parser;
use new_tracks_lib::{BufferStrategy, Config, DEFAULT_TOLERANCE, DifferenceConfig};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// New Tracks - Export the parts of recent trips that were never traveled before
pub struct Settings {
    /// Input CSV file with `type`, `start_datetime` and `path` columns
    #[clap(short, long, value_name = "FILE")]
    pub input_file: PathBuf,

    /// Cutoff date (YYYY-MM-DD or a full timestamp): earlier trips are history, the rest are new
    #[clap(short, long, value_name = "DATE", value_parser = parse_since)]
    pub since_day: NaiveDateTime,

    /// Output CSV file (must not exist yet)
    #[clap(short, long, value_name = "FILE", default_value = "new_tracks.csv")]
    pub output_file: PathBuf,

    /// Comma-separated list of trip types to include
    #[clap(short, long, default_value = "train")]
    pub trip_types: String,

    /// Buffer radius around historical routes, in degrees
    #[clap(long, default_value_t = DEFAULT_TOLERANCE, value_parser = parse_tolerance)]
    pub tolerance: f64,

    /// Buffer every historical route once up front (faster, uses more memory)
    #[clap(long, default_value = "false")]
    pub cache_buffers: bool,

    /// Number of worker threads (default: one per core)
    #[clap(long)]
    pub threads: Option<usize>,
}

impl Settings {
    /// Parse settings from the command line, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Library configuration for these settings
    pub fn to_config(&self) -> Config {
        Config {
            trip_types: new_tracks_lib::parse_trip_types(&self.trip_types),
            difference: DifferenceConfig {
                tolerance: self.tolerance,
                strategy: if self.cache_buffers {
                    BufferStrategy::Cached
                } else {
                    BufferStrategy::PerCandidate
                },
            },
        }
    }
}

fn parse_since(text: &str) -> Result<NaiveDateTime, String> {
    new_tracks_lib::parse_timestamp(text)
        .ok_or_else(|| format!("invalid date '{text}', expected YYYY-MM-DD"))
}

fn parse_tolerance(text: &str) -> Result<f64, String> {
    let value: f64 = text.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("tolerance must be a finite, non-negative number of degrees, got {text}"))
    }
}

//! New Tracks - command line entry point
//!
//! Reads a CSV of trips, keeps the selected trip types, and writes one row per
//! route fragment traveled on or after `--since-day` that no earlier trip covered.

mod logging;
mod metadata;
mod settings;

use new_tracks_lib::{DataError, Pipeline, RunSummary, ensure_output_available};
use settings::Settings;
use std::process::ExitCode;

/// Fatal errors of the command line tool
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("No trip types selected (got {0:?})")]
    NoTripTypes(String),

    #[error("Failed to configure worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn main() -> ExitCode {
    let _logging = logging::setup_logging();
    metadata::log_version_info();

    let settings = Settings::from_cli();
    match run(&settings) {
        Ok(summary) => {
            log_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<RunSummary, AppError> {
    // Refuse before doing any work if the output is taken
    ensure_output_available(&settings.output_file)?;

    let config = settings.to_config();
    if config.trip_types.is_empty() {
        return Err(AppError::NoTripTypes(settings.trip_types.clone()));
    }

    if let Some(threads) = settings.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let pipeline = Pipeline::new(config);
    Ok(pipeline.run(
        &settings.input_file,
        &settings.output_file,
        settings.since_day,
    )?)
}

fn log_summary(summary: &RunSummary) {
    tracing::info!("--- Summary ---");
    tracing::info!("Records loaded: {}", summary.records_loaded);
    tracing::info!("Records of selected types: {}", summary.records_matching_type);
    tracing::info!("Records with valid dates: {}", summary.records_with_valid_dates);
    tracing::info!(
        "Historical trips: {} ({} valid lines)",
        summary.historical_trips,
        summary.valid_historical_lines
    );
    tracing::info!(
        "New trips: {} ({} valid lines, {} failed)",
        summary.new_trips,
        summary.valid_new_lines,
        summary.failed_candidates
    );
    tracing::info!("New route fragments: {}", summary.fragments);
    tracing::info!("Rows written: {}", summary.rows_written);
}

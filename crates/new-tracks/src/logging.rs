/*!
Logging and profiling setup for the command line tool.

Logs go to stderr through a `tracing-subscriber` fmt layer filtered by `RUST_LOG`
(default: `debug` in debug builds, `info` otherwise).

With the `profiling` feature, setting `ENABLE_PROFILING` additionally records a
Chrome trace (`new-tracks-trace-<unix time>.json`, open it in Perfetto or
chrome://tracing) of every `profiling::scope!` in the library.
*/

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(feature = "profiling")]
type ProfilingGuard = tracing_chrome::FlushGuard;
#[cfg(not(feature = "profiling"))]
type ProfilingGuard = ();

/// Keeps the trace writer alive; the trace file is flushed when this is dropped
pub struct LoggingGuard {
    _profiling: Option<ProfilingGuard>,
}

/// Install the global subscriber. Call once, at startup.
pub fn setup_logging() -> LoggingGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cfg!(debug_assertions) { "debug" } else { "info" })
    });
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let (profiling_layer, profiling) = profiling_layer();
    tracing_subscriber::registry()
        .with(profiling_layer)
        .with(fmt_layer)
        .init();

    let guard = profiling.map(|(guard, path)| {
        tracing::info!("Profiling enabled, writing Chrome trace to {}", path.display());
        guard
    });

    LoggingGuard { _profiling: guard }
}

#[cfg(feature = "profiling")]
fn profiling_layer<S>() -> (
    Option<tracing_chrome::ChromeLayer<S>>,
    Option<(ProfilingGuard, std::path::PathBuf)>,
)
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span> + Send + Sync,
{
    if std::env::var("ENABLE_PROFILING").is_err() {
        return (None, None);
    }

    let started = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = std::path::PathBuf::from(format!("new-tracks-trace-{started}.json"));

    let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file(&path)
        .include_args(true)
        .build();
    (Some(layer), Some((guard, path)))
}

#[cfg(not(feature = "profiling"))]
fn profiling_layer() -> (
    Option<tracing_subscriber::layer::Identity>,
    Option<(ProfilingGuard, std::path::PathBuf)>,
) {
    (None, None)
}

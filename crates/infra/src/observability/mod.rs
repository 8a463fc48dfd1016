//! Logging and tracing setup
//!
//! Installs a `tracing-subscriber` fmt layer filtered by `RUST_LOG`, falling
//! back to the filter the host passes in. Initialization is idempotent: a
//! second call (or a subscriber installed by a test harness) is left in
//! place.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when neither `RUST_LOG` nor the caller provides one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `default_filter`. Returns `false` when a global
/// subscriber was already installed.
pub fn init_tracing(default_filter: Option<&str>, format: LogFormat) -> bool {
    let filter = build_filter(default_filter);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.is_ok()
}

fn build_filter(default_filter: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback_filter(default_filter))
}

fn fallback_filter(default_filter: Option<&str>) -> EnvFilter {
    EnvFilter::try_new(default_filter.unwrap_or(DEFAULT_LOG_FILTER))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

//! Logging setup.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Map a `-v` count to a log level: 0 WARN, 1 INFO, 2 DEBUG, 3+ TRACE.
#[must_use]
pub fn level_for_verbosity(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// Install the global fmt subscriber, writing to stderr.
///
/// Does nothing if a subscriber is already installed.
pub fn init(verbose: u8) {
    let installed = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(LevelFilter::from_level(level_for_verbosity(verbose)))
        .try_init();

    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

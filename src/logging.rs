//! Logging initialization for the CLI

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber writing to stderr
///
/// `verbosity`: 0 = `RUST_LOG` or WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE.
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init(verbosity: u8, json: bool) -> WorkerGuard {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::default().add_directive(Level::INFO.into()),
        2 => EnvFilter::default().add_directive(Level::DEBUG.into()),
        _ => EnvFilter::default().add_directive(Level::TRACE.into()),
    };

    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(fmt::layer().json().with_writer(writer))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(writer))
            .init();
    }

    guard
}

//! Diagnostic logging setup
//!
//! Logs go to stderr so they never mix with table or CSV output.
//! Priority: `RUST_LOG` > `--debug` > default level.

use tracing_subscriber::EnvFilter;

/// Level used when neither `RUST_LOG` nor `--debug` is given
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Initialise the global subscriber
pub fn init(debug: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(DEFAULT_LOG_LEVEL)
    };

    // A second init (e.g. from tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Logging initialised");
}

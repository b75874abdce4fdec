//! Structured logging setup

use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber
///
/// Level comes from `RUST_LOG` (default `info`); `json` switches to one JSON
/// object per line for log shippers.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);

    let result = if json { builder.json().try_init() } else { builder.try_init() };
    if let Err(e) = result {
        eprintln!("Warning: logging already initialized: {}", e);
    }
}

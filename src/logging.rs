//! Tracing subscriber setup for the CLI.
//!
//! Logs go to stderr so that command output on stdout stays pipeable.
//! `RUST_LOG` overrides the default `ragline=info` filter.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "ragline=info";

/// Install the global subscriber. `json` switches to one JSON object per line.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // A second init (e.g. from tests) is harmless; keep the first subscriber.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

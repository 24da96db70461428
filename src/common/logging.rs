//! Logging and tracing configuration
//!
//! Stdout belongs to test output: the built-in runner's results and whatever
//! an external runner prints. Diagnostics therefore go to stderr, so a run
//! can be piped or diffed without log lines mixed into the results.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "specrun=info,warn";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize tracing for the CLI
///
/// `specrun run` and the `specrun exec` runner it spawns both call this. The
/// runner inherits `RUST_LOG`, so one setting covers the whole run. Calling it
/// again is a no-op.
pub fn init_cli() {
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_cli();
        init_cli();
        tracing::info!("logging initialised");
    }
}

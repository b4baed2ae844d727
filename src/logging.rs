//! Logging setup using tracing
//!
//! Library code only emits `tracing` events; binaries call `init_logging` once.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Install a stderr subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_logging(default_filter: &str) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(true),
        );

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("[pod-storage] Failed to set tracing subscriber: {}", e);
        }
    });
}

/// Map a `--log-level` style name to a filter directive for this crate
pub fn filter_for_level(level: &str) -> String {
    let level = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    format!("warn,pod_storage={},podctl={}", level, level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_for_level() {
        assert_eq!(filter_for_level("DEBUG"), "warn,pod_storage=debug,podctl=debug");
        assert_eq!(filter_for_level("bogus"), "warn,pod_storage=info,podctl=info");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging("info");
        init_logging("debug");
    }
}

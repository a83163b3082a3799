//! Logging initialization.
//!
//! Logs always go to stderr; stdout carries JSON outcomes.

use prism_core::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize from the `[logging]` section with CLI overrides applied.
pub fn init_from_config(config: &LoggingConfig, verbose: bool, json_logs: bool) {
    let (level, json_format) = resolve(config, verbose, json_logs);
    init(level, json_format);
}

fn resolve(config: &LoggingConfig, verbose: bool, json_logs: bool) -> (&str, bool) {
    let level = match config.level.as_str() {
        "trace" => "trace",
        _ if verbose => "debug",
        "error" | "warn" | "info" | "debug" => config.level.as_str(),
        _ => "info",
    };
    (level, json_logs || config.format == "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str, format: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format: format.to_string(),
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(resolve(&LoggingConfig::default(), false, false), ("info", false));
    }

    #[test]
    fn test_verbose_raises_but_never_lowers() {
        assert_eq!(resolve(&logging("warn", "pretty"), true, false).0, "debug");
        assert_eq!(resolve(&logging("trace", "pretty"), true, false).0, "trace");
    }

    #[test]
    fn test_unknown_level_and_json() {
        assert_eq!(resolve(&logging("loud", "json"), false, false), ("info", true));
        assert!(resolve(&logging("info", "pretty"), false, true).1);
    }
}

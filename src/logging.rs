// src/logging.rs

//! Logging setup for `flowkeeper` using `tracing` + `tracing-subscriber`.
//!
//! Each component logs under its own target (`flowkeeper::reconcile`,
//! `flowkeeper::worker`, `flowkeeper::poller`, ...), so verbosity can be
//! tuned per component with `FLOWKEEPER_LOG` directives such as
//! `flowkeeper::poller=debug,flowkeeper::worker=warn`.
//!
//! Directives are layered in this order, later ones winning for the same
//! target:
//! 1. `info` for everything
//! 2. `FLOWKEEPER_LOG` directives (invalid ones are reported and skipped)
//! 3. `--log-level`, which replaces the catch-all level only
//!
//! Logs go to STDERR; `--dry-run` output is the only thing on stdout.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "FLOWKEEPER_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Build the filter from the CLI level and the raw `FLOWKEEPER_LOG` value.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    EnvFilter::builder().parse_lossy(filter_directives(cli_level, env))
}

fn filter_directives(cli_level: Option<LogLevel>, env: Option<&str>) -> String {
    let mut directives = vec![DEFAULT_DIRECTIVE];
    if let Some(env) = env.map(str::trim).filter(|s| !s.is_empty()) {
        directives.push(env);
    }
    if let Some(level) = cli_level {
        directives.push(level_directive(level));
    }
    directives.join(",")
}

fn level_directive(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .finish()
    }

    #[test]
    fn directives_are_layered() {
        assert_eq!(filter_directives(None, None), "info");
        assert_eq!(filter_directives(None, Some("  ")), "info");
        assert_eq!(
            filter_directives(Some(LogLevel::Warn), Some("flowkeeper::poller=debug")),
            "info,flowkeeper::poller=debug,warn"
        );
    }

    #[test]
    fn component_directives_apply_per_target() {
        let filter = build_filter(
            None,
            Some("flowkeeper::poller=debug,flowkeeper::worker=warn"),
        );

        tracing::subscriber::with_default(subscriber(filter), || {
            assert!(tracing::enabled!(target: "flowkeeper::poller", Level::DEBUG));
            assert!(!tracing::enabled!(target: "flowkeeper::worker", Level::INFO));
            assert!(tracing::enabled!(target: "flowkeeper::worker", Level::WARN));
            assert!(tracing::enabled!(target: "flowkeeper::reconcile", Level::INFO));
            assert!(!tracing::enabled!(target: "flowkeeper::reconcile", Level::DEBUG));
        });
    }

    #[test]
    fn cli_level_replaces_the_catch_all_only() {
        let filter = build_filter(Some(LogLevel::Error), Some("debug,flowkeeper::poller=trace"));

        tracing::subscriber::with_default(subscriber(filter), || {
            assert!(!tracing::enabled!(target: "flowkeeper::reconcile", Level::WARN));
            assert!(tracing::enabled!(target: "flowkeeper::reconcile", Level::ERROR));
            assert!(tracing::enabled!(target: "flowkeeper::poller", Level::TRACE));
        });
    }

    #[test]
    fn invalid_directives_are_skipped() {
        let filter = build_filter(None, Some("flowkeeper::worker=loud,flowkeeper::poller=debug"));

        tracing::subscriber::with_default(subscriber(filter), || {
            assert!(tracing::enabled!(target: "flowkeeper::poller", Level::DEBUG));
            assert!(tracing::enabled!(target: "flowkeeper::worker", Level::INFO));
        });
    }
}

// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `flowkeeper`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "flowkeeper",
    version,
    about = "Keep a workflow process running and service its jobs and human tasks.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Flowkeeper.toml` in the current working directory, if it
    /// exists. Connection settings may also come from the environment.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Reconcile, run one human task cycle, then exit. No worker is started.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLOWKEEPER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the effective plan, but don't contact the engine.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = CliArgs::try_parse_from([
            "flowkeeper",
            "--config",
            "conf/Flowkeeper.toml",
            "--once",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("conf/Flowkeeper.toml")));
        assert!(args.once);
        assert!(!args.dry_run);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }

    #[test]
    fn config_is_optional() {
        let args = CliArgs::try_parse_from(["flowkeeper", "--dry-run"]).unwrap();
        assert!(args.config.is_none());
        assert!(args.dry_run);
    }
}

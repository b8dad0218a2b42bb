//! Configuration and CLI surface for the `runnerd` daemon.
//!
//! `SPEC_FULL.md` §6 defines a single-argument CLI (`runnerd [port]`); this
//! crate exists anyway, mirroring `weaver-config`, so logging and listener
//! settings have one owner instead of being threaded through `main` by hand.

mod logging;

pub use logging::LogFormat;

use std::fmt;

use clap::Parser;

/// Default TCP port the daemon listens on, per `SPEC_FULL.md` §6.
pub const DEFAULT_PORT: u16 = 8000;

/// Default `tracing` filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Command-line arguments accepted by the `runnerd` binary.
///
/// `SPEC_FULL.md` §6: `daemon [port]`; extra positional arguments are a
/// usage error handled by `clap` itself (exit code 2).
#[derive(Debug, Parser)]
#[command(name = "runnerd", about = "Script-execution daemon")]
pub struct Cli {
    /// TCP port to listen on.
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// `tracing` filter directive, e.g. `info` or `runnerd=debug`.
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Structured log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to bind the listener to.
    pub port: u16,
    /// `tracing` filter directive.
    pub log_filter: String,
    /// Structured log output format.
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: LogFormat::default(),
        }
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            port: cli.port,
            log_filter: cli.log_filter,
            log_format: cli.log_format,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "0.0.0.0:{}", self.port)
    }
}

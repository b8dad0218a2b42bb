//! Logging output format, mirroring `weaver_config::logging`.

use clap::ValueEnum;
use strum::{Display, EnumString};

/// Supported `tracing` subscriber output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, ValueEnum)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON, suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single-line output.
    #[default]
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(LogFormat::from_str("JSON").expect("parse"), LogFormat::Json);
    }

    #[test]
    fn defaults_to_compact() {
        assert_eq!(LogFormat::default(), LogFormat::Compact);
    }
}

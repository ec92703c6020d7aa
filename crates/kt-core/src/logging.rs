//! Structured logging foundation for kt-core.
//!
//! Dual-mode logging in the same spirit as the rest of the CLI surface:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for automation
//!
//! stdout is reserved for command payloads (scan results, check reports);
//! all log output goes to stderr.

use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console format (default).
    #[default]
    Human,
    /// Machine-parseable JSON lines.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "console" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" | "structured" | "machine" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Human => write!(f, "human"),
            LogFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: tracing::Level,
    pub no_color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            level: tracing::Level::INFO,
            no_color: false,
        }
    }
}

impl LogConfig {
    /// Build from CLI flags. `KEYTRACE_LOG_FORMAT` overrides the format
    /// when no explicit flag was given; `RUST_LOG` still wins for the
    /// filter itself.
    pub fn from_flags(
        format: Option<LogFormat>,
        verbose: u8,
        quiet: bool,
        no_color: bool,
    ) -> Self {
        let format = format
            .or_else(|| {
                std::env::var("KEYTRACE_LOG_FORMAT")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or_default();

        let level = if quiet {
            tracing::Level::WARN
        } else {
            match verbose {
                0 => tracing::Level::INFO,
                1 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            }
        };

        Self {
            format,
            level,
            no_color,
        }
    }
}

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs. Respects
/// RUST_LOG for fine-grained filter overrides.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "kt_core={level},kt_config={level},kt_common={level}",
            level = config.level
        ))
    });

    match config.format {
        LogFormat::Human => {
            let use_ansi = !config.no_color && std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
        LogFormat::Jsonl => {
            let jsonl_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(jsonl_layer)
                .init();
        }
    }
}

/// Print the startup banner to stderr.
///
/// Identifies the target library and the run, before any capture output.
pub fn print_banner(run_id: &kt_common::RunId, module: &str, pid: u32) {
    eprintln!(
        "keytrace v{} [{}] watching for '{}' in pid {}",
        crate::VERSION,
        run_id,
        module,
        pid
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert!("csv".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(
            LogConfig::from_flags(Some(LogFormat::Human), 0, false, false).level,
            tracing::Level::INFO
        );
        assert_eq!(
            LogConfig::from_flags(Some(LogFormat::Human), 1, false, false).level,
            tracing::Level::DEBUG
        );
        assert_eq!(
            LogConfig::from_flags(Some(LogFormat::Human), 3, false, false).level,
            tracing::Level::TRACE
        );
        assert_eq!(
            LogConfig::from_flags(Some(LogFormat::Human), 2, true, false).level,
            tracing::Level::WARN
        );
    }
}

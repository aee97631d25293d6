//! Logging setup for isotika binaries.
//!
//! The library only emits `tracing` events; binaries decide where they go.
//!
//! # Environment Variables
//!
//! - `ISOTIKA_LOG` - Log filter (overrides RUST_LOG)
//! - `RUST_LOG` - Standard Rust log filter (fallback)
//!
//! Worker stdout/stderr is logged at `trace` under the `isotika::worker`
//! target, so `ISOTIKA_LOG=isotika::worker=trace` shows what the Tika server
//! prints.
//!
//! # Example
//!
//! ```no_run
//! use isotika::logging::{init, LogConfig, LogFormat};
//!
//! init(LogConfig::default().with_format(LogFormat::Compact));
//! ```

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format (default)
    #[default]
    Compact,
    /// JSON format for log aggregation systems
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "full" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Unknown log format: '{}'. Valid options: pretty, compact, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Compact => write!(f, "compact"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level (default: INFO)
    pub level: Level,
    /// Output format (default: Compact)
    pub format: LogFormat,
    /// Custom filter string (overrides level if set)
    pub filter: Option<String>,
    /// Show target module in logs (default: true)
    pub show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            filter: None,
            show_target: true,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Build the filter: `ISOTIKA_LOG`, then `RUST_LOG`, then the explicit
    /// filter, then the level.
    pub fn env_filter(&self) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_env("ISOTIKA_LOG") {
            return filter;
        }
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        let directive = self
            .filter
            .clone()
            .unwrap_or_else(|| self.level.to_string().to_lowercase());
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber, logging to stderr.
///
/// Calling this twice is harmless: the second call is ignored.
pub fn init(config: LogConfig) {
    let filter = config.env_filter();
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(config.show_target)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(config.show_target)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(config.show_target)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

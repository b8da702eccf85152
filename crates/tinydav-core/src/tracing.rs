//! Tracing setup for tinydav binaries.
//!
//! The library crates only emit `tracing` events; installing a subscriber is
//! left to the application. This module is the one place that does it.
//!
//! ```ignore
//! use tinydav_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::cli_debug()).expect("failed to initialize tracing");
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to set global subscriber
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Failed to parse env filter directive
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line human-readable output
    Pretty,
    /// Single-line output (default)
    #[default]
    Compact,
    /// JSON lines, for devices that ship logs to a collector
    Json,
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level applied to the `tinydav` crates when `RUST_LOG` is not set
    pub default_level: Level,
    /// Output format
    pub output_format: TracingOutputFormat,
    /// Include file/line information
    pub include_location: bool,
    /// Include the module path of each event
    pub include_target: bool,
    /// Include timestamps
    pub include_timestamp: bool,
    /// Explicit filter directive; wins over both `RUST_LOG` and `default_level`
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::WARN,
            output_format: TracingOutputFormat::Compact,
            include_location: false,
            include_target: false,
            include_timestamp: true,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// Verbose single-line output for interactive debugging.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            output_format: TracingOutputFormat::Compact,
            include_location: true,
            include_target: true,
            include_timestamp: false,
            env_filter: None,
        }
    }

    /// JSON output for headless devices.
    #[must_use]
    pub fn device() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Json,
            include_location: false,
            include_target: true,
            include_timestamp: true,
            env_filter: None,
        }
    }

    /// Set the default log level
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set a custom env filter directive
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// The directive used when neither `env_filter` nor `RUST_LOG` is set.
    pub fn default_directive(&self) -> String {
        let level = self.default_level.to_string().to_lowercase();
        format!("tinydav={level},tinydav_caldav={level},tinydav_core={level}")
    }
}

/// Initialize tracing with the given configuration.
///
/// Call once at startup. `RUST_LOG` overrides the default level.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed or if
/// the filter directive is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter = match config.env_filter {
        Some(ref filter) => EnvFilter::try_new(filter)?,
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(config.default_directive()))?,
    };

    let layer = match config.output_format {
        TracingOutputFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target)
            .boxed(),
        TracingOutputFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target);
            if config.include_timestamp {
                layer.boxed()
            } else {
                layer.without_time().boxed()
            }
        }
        TracingOutputFormat::Json => fmt::layer()
            .json()
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(env_filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

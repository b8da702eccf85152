//! Command-line interface definition.

use std::time::Duration;

use clap::{Parser, Subcommand};
use tinydav_caldav::CalDavConfig;

use crate::error::{CliError, CliResult};

/// tinydav - talk to a CalDAV server from the terminal
#[derive(Debug, Parser)]
#[command(name = "tinydav")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Server URL, usually the calendar home collection
    #[arg(long, env = "TINYDAV_URL")]
    pub url: String,

    /// Username for Basic authentication
    #[arg(long, short, env = "TINYDAV_USERNAME")]
    pub username: String,

    /// Password for Basic authentication
    #[arg(long, short, env = "TINYDAV_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Default calendar path used for event queries
    #[arg(long, env = "TINYDAV_CALENDAR")]
    pub calendar: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = CalDavConfig::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k')]
    pub insecure: bool,

    /// Cap on the bytes one operation may hold
    #[arg(long)]
    pub max_response_bytes: Option<usize>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Builds the session configuration from the flags.
    pub fn caldav_config(&self) -> CliResult<CalDavConfig> {
        let mut config = CalDavConfig::new(&self.url)
            .map_err(|e| CliError::Config(format!("invalid server URL '{}': {}", self.url, e)))?
            .with_credentials(self.username.as_str(), self.password.as_str())
            .with_timeout(Duration::from_secs(self.timeout));

        if let Some(ref calendar) = self.calendar {
            config = config.with_calendar_path(calendar.as_str());
        }
        if self.insecure {
            config = config.with_insecure_tls();
        }
        if let Some(limit) = self.max_response_bytes {
            config = config.with_max_response_bytes(limit);
        }
        Ok(config)
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the server answers and accepts the credentials
    Test,

    /// List the calendars under the server URL
    Calendars {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List events in a time range
    Events {
        /// Calendar path, overrides --calendar
        #[arg(long, value_name = "PATH")]
        calendar: Option<String>,

        /// Range start (YYYYMMDDTHHMMSSZ, RFC 3339 or YYYY-MM-DD), defaults to now
        #[arg(long)]
        from: Option<String>,

        /// Range end, defaults to seven days after the start
        #[arg(long)]
        to: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Find a calendar by name or display name
    Find {
        /// Name to look for
        name: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Fetch a single event resource
    GetEvent {
        /// Event path, relative to the calendar or absolute
        path: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

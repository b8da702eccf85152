//! CLI error types.

use std::fmt;

use tinydav_caldav::{CalDavError, ErrorCode};
use tinydav_core::TimeError;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI.
#[derive(Debug)]
pub enum CliError {
    /// Bad flags or environment.
    Config(String),
    /// An invalid `--from` / `--to` value.
    Time(TimeError),
    /// The CalDAV session reported a failure.
    CalDav(CalDavError),
    /// Writing output failed.
    Io(std::io::Error),
    /// JSON rendering failed.
    Json(serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// Session errors map onto distinct codes so scripts can tell an
    /// authentication or network problem from a missing calendar.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Time(_) => 2,
            Self::CalDav(err) => match err.code() {
                ErrorCode::InvalidArgument | ErrorCode::NotInitialized => 2,
                ErrorCode::ConnectionError | ErrorCode::Timeout => 3,
                ErrorCode::HttpError => 4,
                ErrorCode::NotFound => 5,
                ErrorCode::OutOfMemory | ErrorCode::GeneralFailure => 1,
            },
            Self::Io(_) | Self::Json(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Time(err) => write!(f, "time range error: {}", err),
            Self::CalDav(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(_) => None,
            Self::Time(err) => Some(err),
            Self::CalDav(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

impl From<CalDavError> for CliError {
    fn from(err: CalDavError) -> Self {
        Self::CalDav(err)
    }
}

impl From<TimeError> for CliError {
    fn from(err: TimeError) -> Self {
        Self::Time(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(CliError::Config("x".into()).exit_code(), 2);
        assert_eq!(CliError::from(CalDavError::timeout("slow")).exit_code(), 3);
        assert_eq!(CliError::from(CalDavError::connection("refused")).exit_code(), 3);
        assert_eq!(CliError::from(CalDavError::not_found("gone")).exit_code(), 5);
        assert_eq!(
            CliError::from(CalDavError::out_of_memory("cap")).exit_code(),
            1
        );
    }

    #[test]
    fn caldav_errors_display_unchanged() {
        let expected = CalDavError::not_found("no calendar named 'x'").to_string();
        let err = CliError::from(CalDavError::not_found("no calendar named 'x'"));
        assert_eq!(err.to_string(), expected);
    }
}

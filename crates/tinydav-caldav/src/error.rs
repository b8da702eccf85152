//! Error types for CalDAV operations.
//!
//! Every operation reports one [`ErrorCode`]. Missing optional data (an absent
//! tag, an absent field, an empty list) is never an error.

use std::fmt;
use thiserror::Error;

/// The category of a CalDAV error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A required argument was missing or invalid, or the session is closed.
    InvalidArgument,
    /// An allocation failed or the memory budget was exhausted.
    OutOfMemory,
    /// Unexpected internal failure.
    GeneralFailure,
    /// The session was never initialized or has been deinitialized.
    NotInitialized,
    /// The transport could not reach the server.
    ConnectionError,
    /// Unexpected HTTP status or a body that is not a DAV response.
    HttpError,
    /// The transport gave up waiting.
    Timeout,
    /// The requested calendar or event does not exist.
    NotFound,
}

impl ErrorCode {
    /// Returns a stable snake_case name for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::OutOfMemory => "out_of_memory",
            Self::GeneralFailure => "general_failure",
            Self::NotInitialized => "not_initialized",
            Self::ConnectionError => "connection_error",
            Self::HttpError => "http_error",
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
        }
    }

    /// Returns true if the failure came from the network rather than the data.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionError | Self::Timeout)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error returned by a CalDAV operation.
#[derive(Debug, Error)]
pub struct CalDavError {
    code: ErrorCode,
    message: String,
    /// HTTP status of the response that caused the error, if there was one.
    http_status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CalDavError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            http_status: None,
            source: None,
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    /// Creates an out of memory error.
    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OutOfMemory, message)
    }

    /// Creates a general failure.
    pub fn general(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GeneralFailure, message)
    }

    /// Creates a not initialized error.
    pub fn not_initialized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotInitialized, message)
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConnectionError, message)
    }

    /// Creates an HTTP error.
    pub fn http(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::HttpError, message)
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Attaches the HTTP status that triggered this error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if one was recorded.
    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }
}

impl fmt::Display for CalDavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(status) = self.http_status {
            write!(f, " (HTTP {status})")?;
        }
        Ok(())
    }
}

/// A specialized Result type for CalDAV operations.
pub type CalDavResult<T> = Result<T, CalDavError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_names() {
        assert_eq!(ErrorCode::InvalidArgument.as_str(), "invalid_argument");
        assert_eq!(ErrorCode::OutOfMemory.as_str(), "out_of_memory");
        assert_eq!(ErrorCode::HttpError.to_string(), "http_error");
        assert_eq!(ErrorCode::NotFound.to_string(), "not_found");
    }

    #[test]
    fn transport_codes() {
        assert!(ErrorCode::ConnectionError.is_transport());
        assert!(ErrorCode::Timeout.is_transport());
        assert!(!ErrorCode::HttpError.is_transport());
        assert!(!ErrorCode::OutOfMemory.is_transport());
    }

    #[test]
    fn error_creation() {
        let err = CalDavError::http("unexpected status");
        assert_eq!(err.code(), ErrorCode::HttpError);
        assert_eq!(err.message(), "unexpected status");
        assert!(err.http_status().is_none());
    }

    #[test]
    fn error_display() {
        let err = CalDavError::http("authentication failed").with_status(401);
        assert_eq!(err.to_string(), "http_error: authentication failed (HTTP 401)");

        let err = CalDavError::timeout("no response");
        assert_eq!(err.to_string(), "timeout: no response");
    }

    #[test]
    fn error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("reset by peer");
        let err = CalDavError::connection("read failed").with_source(io_err);
        assert!(err.source().is_some());
    }
}

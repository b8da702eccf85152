//! Status interpretation: transport outcome and HTTP status to error code.
//!
//! A non-accepted status stops the operation before any parsing happens.

use tracing::{debug, error, warn};

use crate::error::{CalDavError, CalDavResult};
use crate::transport::TransportError;

/// The operation a response belongs to. Each accepts its own set of codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    TestConnection,
    ListCalendars,
    ListEvents,
    GetEvent,
}

impl Operation {
    /// Status codes treated as success.
    pub fn accepted(&self) -> &'static [u16] {
        match self {
            Self::TestConnection => &[200, 204, 207],
            Self::ListCalendars => &[200, 207],
            Self::ListEvents => &[207],
            Self::GetEvent => &[200],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestConnection => "test_connection",
            Self::ListCalendars => "list_calendars",
            Self::ListEvents => "list_events",
            Self::GetEvent => "get_event",
        }
    }
}

/// Maps a transport failure to the error taxonomy.
pub fn transport_failure(op: Operation, err: TransportError) -> CalDavError {
    error!(operation = op.as_str(), error = %err, "Transport failure");
    match err {
        TransportError::Timeout => CalDavError::timeout("request timed out").with_source(err),
        TransportError::Connection(_) => {
            CalDavError::connection(format!("{} failed: {err}", op.as_str())).with_source(err)
        }
    }
}

/// Checks an HTTP status against what `op` accepts.
///
/// # Errors
///
/// `HttpError` carrying the status for anything not accepted. A 401 is
/// logged as an authentication failure but reported with the same code.
pub fn check_status(op: Operation, status: u16) -> CalDavResult<()> {
    if op.accepted().contains(&status) {
        debug!(operation = op.as_str(), status, "Accepted response status");
        return Ok(());
    }

    if status == 401 {
        error!(operation = op.as_str(), "Authentication failed, check username and password");
        return Err(CalDavError::http("authentication failed").with_status(status));
    }

    warn!(operation = op.as_str(), status, "Unexpected response status");
    Err(CalDavError::http(format!("unexpected status {status}")).with_status(status))
}

/// Full interpretation: transport outcome first, then the status.
pub fn interpret(op: Operation, outcome: Result<u16, TransportError>) -> CalDavResult<()> {
    match outcome {
        Ok(status) => check_status(op, status),
        Err(err) => Err(transport_failure(op, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    const PROBE: &[u16] = &[100, 200, 201, 204, 207, 301, 302, 400, 401, 403, 404, 405, 500, 503];

    #[test]
    fn status_table() {
        let table: &[(Operation, &[u16])] = &[
            (Operation::TestConnection, &[200, 204, 207]),
            (Operation::ListCalendars, &[200, 207]),
            (Operation::ListEvents, &[207]),
            (Operation::GetEvent, &[200]),
        ];

        for (op, ok) in table {
            for &status in PROBE {
                let result = interpret(*op, Ok(status));
                if ok.contains(&status) {
                    assert!(result.is_ok(), "{op:?} should accept {status}");
                } else {
                    let err = result.unwrap_err();
                    assert_eq!(err.code(), ErrorCode::HttpError, "{op:?} {status}");
                    assert_eq!(err.http_status(), Some(status));
                }
            }
        }
    }

    #[test]
    fn unauthorized_is_http_error() {
        let err = check_status(Operation::ListCalendars, 401).unwrap_err();
        assert_eq!(err.code(), ErrorCode::HttpError);
        assert_eq!(err.message(), "authentication failed");
    }

    #[test]
    fn transport_failures() {
        let err = interpret(
            Operation::TestConnection,
            Err(TransportError::Connection("refused".to_string())),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConnectionError);
        assert_eq!(err.http_status(), None);

        let err = interpret(Operation::ListEvents, Err(TransportError::Timeout)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Timeout);
    }
}

//! The boundary between the engine and whatever moves bytes.
//!
//! A [`Transport`] takes one fully built [`DavRequest`] and returns the status
//! plus a reader over the body. Requests are built fresh for every call and
//! carry their own headers and timeout, so a transport holds no per-call
//! state.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// HTTP methods the engine issues.
///
/// REPORT is not here: it travels as POST with an override header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DavMethod {
    Propfind,
    Post,
    Get,
}

impl DavMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Propfind => "PROPFIND",
            Self::Post => "POST",
            Self::Get => "GET",
        }
    }
}

impl std::fmt::Display for DavMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavRequest {
    pub method: DavMethod,
    pub url: Url,
    /// Headers in send order.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl DavRequest {
    /// Returns the first header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a response.
pub struct DavResponse {
    pub status: u16,
    /// The body, read to the end by the caller.
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for DavResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DavResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Failure to get any response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Sends requests. Implementations must be usable from any thread.
pub trait Transport: Send + Sync {
    fn send(&self, request: &DavRequest) -> Result<DavResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &DavRequest) -> Result<DavResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &DavRequest) -> Result<DavResponse, TransportError> {
        (**self).send(request)
    }
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use reqwest::Method;
    use reqwest::blocking::Client;
    use tracing::trace;

    use super::{DavRequest, DavResponse, Transport, TransportError};
    use crate::auth::basic_auth;
    use crate::config::CalDavConfig;
    use crate::error::{CalDavError, CalDavResult};

    /// Blocking HTTP transport on reqwest with rustls.
    pub struct HttpTransport {
        client: Client,
        authorization: Option<String>,
    }

    impl HttpTransport {
        /// Builds a client from the TLS, timeout, user agent and credential
        /// settings of `config`.
        pub fn new(config: &CalDavConfig) -> CalDavResult<Self> {
            let client = Client::builder()
                .danger_accept_invalid_certs(!config.verify_tls)
                .timeout(config.timeout)
                .user_agent(&config.user_agent)
                .build()
                .map_err(|e| {
                    CalDavError::general(format!("failed to create HTTP client: {e}"))
                        .with_source(e)
                })?;

            let authorization = match (&config.username, &config.password) {
                (Some(user), Some(pass)) => Some(basic_auth(user, pass)),
                _ => None,
            };

            Ok(Self {
                client,
                authorization,
            })
        }
    }

    impl Transport for HttpTransport {
        fn send(&self, request: &DavRequest) -> Result<DavResponse, TransportError> {
            let method = Method::from_bytes(request.method.as_str().as_bytes())
                .map_err(|e| TransportError::Connection(format!("invalid method: {e}")))?;

            let mut builder = self
                .client
                .request(method, request.url.clone())
                .timeout(request.timeout);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(auth) = &self.authorization {
                builder = builder.header("Authorization", auth.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            trace!(method = %request.method, url = %request.url, "Sending request");

            let response = builder.send().map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connection(e.to_string())
                }
            })?;

            let status = response.status().as_u16();
            trace!(status, "Received response");
            Ok(DavResponse {
                status,
                body: Box::new(response),
            })
        }
    }

}

//! Session configuration.

use std::time::Duration;
use url::Url;

use crate::error::{CalDavError, CalDavResult};

/// Configuration for a CalDAV session.
#[derive(Clone)]
pub struct CalDavConfig {
    /// Base URL of the server, usually a calendar home collection.
    pub url: Url,

    /// Username for Basic authentication.
    pub username: Option<String>,

    /// Password for Basic authentication.
    pub password: Option<String>,

    /// Calendar queried when `list_events` is not given one.
    pub calendar_path: Option<String>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Timeout applied to every request.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,

    /// Cap on the bytes one operation may hold (response body plus records).
    pub max_response_bytes: Option<usize>,
}

impl CalDavConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a new configuration for the given server URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url.as_ref())?;
        Ok(Self {
            url: parsed,
            username: None,
            password: None,
            calendar_path: None,
            verify_tls: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("tinydav/{}", env!("CARGO_PKG_VERSION")),
            max_response_bytes: None,
        })
    }

    /// Sets the credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the default calendar path.
    pub fn with_calendar_path(mut self, path: impl Into<String>) -> Self {
        self.calendar_path = Some(path.into());
        self
    }

    /// Disables TLS verification (for testing only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Caps the memory a single operation may use.
    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = Some(limit);
        self
    }

    /// Returns the base URL as a string.
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns true if both username and password are set and non-empty.
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Checks that a session can be opened with this configuration.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the scheme is not http(s), the URL has no host or
    /// the credentials are missing.
    pub fn validate(&self) -> CalDavResult<()> {
        if !matches!(self.url.scheme(), "http" | "https") {
            return Err(CalDavError::invalid_argument(format!(
                "unsupported URL scheme '{}'",
                self.url.scheme()
            )));
        }
        if self.url.host_str().is_none_or(str::is_empty) {
            return Err(CalDavError::invalid_argument("server URL has no host"));
        }
        if !self.has_credentials() {
            return Err(CalDavError::invalid_argument(
                "username and password are required",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CalDavConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalDavConfig")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("calendar_path", &self.calendar_path)
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}

//! HTTP Basic authentication.

use base64::Engine;

/// Generates a Basic authentication header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{username}:{password}");
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {encoded}")
}

//! Shared blocking HTTP client and fetch helpers.

use std::time::Duration;

use recast_common::constants::{APP_NAME, HTTP_TIMEOUT_SECS};
use recast_common::error::{RecastError, Result};
use reqwest::blocking::Client;

/// Builds the client every resolver shares.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(concat!("recast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RecastError::Config {
            message: format!("unable to build {APP_NAME} HTTP client: {e}"),
        })
}

/// Fetches `url` and returns the body as text.
///
/// # Errors
///
/// Returns a resolver error on transport failure or a non-success status.
pub fn get_text(client: &Client, url: &str) -> Result<String> {
    tracing::debug!(url, "fetching text");
    client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .and_then(reqwest::blocking::Response::text)
        .map_err(|e| RecastError::resolver(url, e))
}

/// Fetches `url` and returns the raw body.
///
/// # Errors
///
/// Returns a resolver error on transport failure or a non-success status.
pub fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>> {
    tracing::debug!(url, "fetching bytes");
    client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .and_then(reqwest::blocking::Response::bytes)
        .map(|b| b.to_vec())
        .map_err(|e| RecastError::resolver(url, e))
}

/// Joins a base URL and a relative path with exactly one slash between them.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("https://dl-cdn.alpinelinux.org/alpine/", "/latest-stable/"),
            "https://dl-cdn.alpinelinux.org/alpine/latest-stable/"
        );
        assert_eq!(join_url("https://a", "b"), "https://a/b");
    }
}

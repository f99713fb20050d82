//! Regex extraction from arbitrary web documents.

use recast_common::error::{RecastError, Result};
use regex::Regex;
use reqwest::blocking::Client;

use crate::ContentResolver;
use crate::http::get_text;

/// Fetches documents over HTTP and scrapes them with a pattern.
#[derive(Debug, Clone)]
pub struct RegexContent {
    http: Client,
}

impl RegexContent {
    /// Creates the resolver.
    #[must_use]
    pub const fn new(http: Client) -> Self {
        Self { http }
    }
}

impl ContentResolver for RegexContent {
    fn regex_url_content(&self, url: &str, pattern: &str) -> Result<String> {
        let regex = Regex::new(pattern)
            .map_err(|e| RecastError::resolver(url, format!("invalid pattern '{pattern}': {e}")))?;
        let body = get_text(&self.http, url)?;
        first_match(&regex, &body)
            .ok_or_else(|| RecastError::resolver(url, format!("no match for '{pattern}'")))
    }
}

/// Returns the first capture group of the first match, or the whole match
/// when the pattern has no groups.
#[must_use]
pub fn first_match(regex: &Regex, haystack: &str) -> Option<String> {
    let caps = regex.captures(haystack)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
}

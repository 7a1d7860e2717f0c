use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const USER_AGENT_DEFAULT: &str = "Mozilla/5.0 (compatible; ReadLaterBot/1.0)";
pub const ACCEPT_DEFAULT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub const FETCH_TIMEOUT_DEFAULT: Duration = Duration::from_secs(10);

/// Preview fields resolved for a single URL.
///
/// `domain` is the only field that is always present. URL-valued fields are
/// absolute whenever they are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LinkMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub site_name: Option<String>,
    pub domain: String,
    pub favicon_url: Option<String>,
    /// Minutes, estimated from the word count of the page body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<u32>,
}

impl LinkMetadata {
    /// Returns true if any preview tag beyond the domain was resolved
    pub fn has_any_data(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.thumbnail_url.is_some()
            || self.site_name.is_some()
            || self.favicon_url.is_some()
    }

    /// Field names that are populated (for logging)
    pub fn describe_fields(&self) -> String {
        let mut fields = vec!["domain"];
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.thumbnail_url.is_some() {
            fields.push("thumbnail_url");
        }
        if self.site_name.is_some() {
            fields.push("site_name");
        }
        if self.favicon_url.is_some() {
            fields.push("favicon_url");
        }
        if self.reading_time.is_some() {
            fields.push("reading_time");
        }
        fields.join(",")
    }
}

/// Request settings for page fetches
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: FETCH_TIMEOUT_DEFAULT,
            user_agent: USER_AGENT_DEFAULT.to_string(),
            accept: ACCEPT_DEFAULT.to_string(),
        }
    }
}

/// Failure modes of a single page fetch. None of them reach the caller of the
/// resolver; every variant ends in fallback metadata.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("request timed out")]
    Timeout,

    #[error("http status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("couldn't read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

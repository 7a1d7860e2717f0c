use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `original_app` recorded for links that arrive through the share sheet
pub const SHARE_ORIGINAL_APP: &str = "Shared";

static URL_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("url pattern is valid"));

/// What an OS share sheet hands over: a web URL, free text, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl SharePayload {
    /// The URL to save: `web_url` when present, else the first http(s)
    /// token found in `text`.
    pub fn url(&self) -> Option<String> {
        let web_url = self
            .web_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());

        if let Some(url) = web_url {
            return Some(url.to_string());
        }

        self.text
            .as_deref()
            .and_then(|text| URL_IN_TEXT.find(text))
            .map(|m| m.as_str().to_string())
    }
}

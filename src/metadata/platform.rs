use serde::{Deserialize, Serialize};

use crate::metadata::normalize::host_of;

/// Label used for `shared_from` when nothing better is known
pub const DEFAULT_SHARE_SOURCE: &str = "Safari";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Instagram,
    #[serde(rename = "youtube")]
    YouTube,
    Article,
    Default,
}

/// Hosts are matched as the domain itself or any subdomain of it.
const PLATFORM_HOSTS: &[(Platform, &[&str])] = &[
    (Platform::Twitter, &["x.com", "twitter.com"]),
    (Platform::Instagram, &["instagram.com"]),
    (Platform::YouTube, &["youtube.com", "youtu.be"]),
    (Platform::Article, &["medium.com", "dev.to", "qiita.com"]),
];

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::YouTube => "youtube",
            Platform::Article => "article",
            Platform::Default => "default",
        }
    }

    /// Estimated reading time in minutes
    pub fn reading_time(&self) -> u32 {
        match self {
            Platform::Twitter | Platform::Instagram => 1,
            Platform::YouTube => 10,
            Platform::Article => 8,
            Platform::Default => 5,
        }
    }

    /// Pages on these hosts are not worth fetching (login walls, JS-only
    /// rendering); a templated preview is used instead.
    pub fn skips_fetch(&self) -> bool {
        matches!(self, Platform::Twitter)
    }

    /// Human-readable name for platforms that get their own share label
    pub fn display_name(&self) -> Option<&'static str> {
        match self {
            Platform::Twitter => Some("X (Twitter)"),
            Platform::Instagram => Some("Instagram"),
            _ => None,
        }
    }

    pub fn from_host(host: &str) -> Self {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        PLATFORM_HOSTS
            .iter()
            .find(|(_, domains)| domains.iter().any(|domain| host_matches(&host, domain)))
            .map(|(platform, _)| *platform)
            .unwrap_or(Platform::Default)
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub platform: Platform,
    pub estimated_reading_time: u32,
}

/// Classify `url` by hostname. Unparseable URLs land in `Platform::Default`.
pub fn classify(url: &str) -> PlatformInfo {
    let platform = host_of(url)
        .map(|host| Platform::from_host(&host))
        .unwrap_or(Platform::Default);

    PlatformInfo {
        platform,
        estimated_reading_time: platform.reading_time(),
    }
}

/// Where a link was shared from: the platform's own label when it has one,
/// otherwise the app that handed us the link, otherwise the browser default.
pub fn shared_from(platform: Platform, original_app: Option<&str>) -> String {
    if let Some(name) = platform.display_name() {
        return name.to_string();
    }

    original_app
        .map(str::trim)
        .filter(|app| !app.is_empty())
        .unwrap_or(DEFAULT_SHARE_SOURCE)
        .to_string()
}

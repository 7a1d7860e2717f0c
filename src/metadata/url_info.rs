use serde::{Deserialize, Serialize};

/// Guesses about a URL made without fetching it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlInfo {
    pub source: String,
    pub estimated_title: String,
    pub domain: String,
}

impl UrlInfo {
    fn unknown(url: &str) -> Self {
        Self {
            source: "Unknown".to_string(),
            estimated_title: url.to_string(),
            domain: "unknown".to_string(),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title_case<'a>(words: impl Iterator<Item = &'a str>) -> String {
    words.map(capitalize).collect::<Vec<_>>().join(" ")
}

/// `https://www.my-blog.com/posts/hello-big_world` gives source `My Blog`,
/// title `Hello Big World`, domain `my-blog.com`.
pub fn url_info(url: &str) -> UrlInfo {
    let Ok(parsed) = url::Url::parse(url) else {
        return UrlInfo::unknown(url);
    };
    let Some(host) = parsed.host_str() else {
        return UrlInfo::unknown(url);
    };

    let host = host.strip_prefix("www.").unwrap_or(host).to_string();

    let labels: Vec<&str> = host.split('.').collect();
    let stem = labels[..labels.len().saturating_sub(1)].join(".");
    let source = title_case(stem.split('-'));

    let estimated_title = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|last| title_case(last.split(['-', '_'])))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| host.clone());

    UrlInfo {
        source,
        estimated_title,
        domain: host,
    }
}

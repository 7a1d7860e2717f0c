use url::Url;

use crate::metadata::normalize::domain_of;
use crate::metadata::platform::{classify, Platform};
use crate::metadata::types::LinkMetadata;

/// Templated metadata derived from the URL alone. Used for short-circuited
/// platforms and whenever the page can't be fetched.
pub fn fallback(url: &str) -> LinkMetadata {
    let domain = domain_of(url);

    match classify(url).platform {
        Platform::Twitter => twitter_fallback(url, domain),
        _ => LinkMetadata {
            title: Some(format!("Page on {domain}")),
            description: Some(format!("Content from {domain}")),
            thumbnail_url: None,
            site_name: Some(domain.clone()),
            domain,
            favicon_url: None,
            reading_time: None,
        },
    }
}

fn twitter_fallback(url: &str, domain: String) -> LinkMetadata {
    let title = match twitter_handle(url) {
        Some(handle) => format!("Post by @{handle}"),
        None => "Post on X (Twitter)".to_string(),
    };

    LinkMetadata {
        title: Some(title),
        description: Some("Content shared from X (Twitter)".to_string()),
        thumbnail_url: None,
        site_name: Platform::Twitter.display_name().map(str::to_string),
        domain,
        favicon_url: None,
        reading_time: None,
    }
}

/// First path segment of an x.com / twitter.com URL, e.g. `alice` for
/// `https://x.com/alice/status/1`.
fn twitter_handle(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.find(|s| !s.is_empty())?;
    let handle = segment.trim_start_matches('@');
    if handle.is_empty() {
        None
    } else {
        Some(handle.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_fallback_is_templated_from_domain() {
        let m = fallback("https://news.example.com/a/b");
        assert_eq!(m.domain, "news.example.com");
        assert_eq!(m.title.as_deref(), Some("Page on news.example.com"));
        assert_eq!(m.description.as_deref(), Some("Content from news.example.com"));
        assert_eq!(m.site_name.as_deref(), Some("news.example.com"));
        assert_eq!(m.thumbnail_url, None);
        assert_eq!(m.favicon_url, None);
    }

    #[test]
    fn twitter_fallback_uses_handle() {
        let m = fallback("https://x.com/alice/status/1");
        assert_eq!(m.domain, "x.com");
        assert_eq!(m.site_name.as_deref(), Some("X (Twitter)"));
        assert!(m.title.as_deref().unwrap().contains("alice"));
    }

    #[test]
    fn twitter_fallback_without_handle() {
        let m = fallback("https://twitter.com/");
        assert_eq!(m.title.as_deref(), Some("Post on X (Twitter)"));
        assert_eq!(m.site_name.as_deref(), Some("X (Twitter)"));
    }

    #[test]
    fn unparseable_url_still_yields_metadata() {
        let m = fallback("garbage");
        assert_eq!(m.domain, "garbage");
        assert_eq!(m.title.as_deref(), Some("Page on garbage"));
    }
}

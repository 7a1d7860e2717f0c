use url::Url;

const TRACKING_PARAMS: [&str; 5] = ["fbclid", "gclid", "ref", "mc_cid", "mc_eid"];

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

/// Hostname of `url`, or the input itself when it doesn't parse or has no host.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Lowercased hostname, if `url` parses and has one.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Resolve `href` found on the page at `base` into an absolute http(s) URL.
///
/// Absolute hrefs are kept, relative and protocol-relative ones are joined
/// against `base`. Inline `data:` URIs, other schemes and anything that fails
/// to join return `None`.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = match Url::parse(href) {
        Ok(absolute) => absolute,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(href).ok()?,
        Err(err) => {
            log::debug!("dropping unparseable href {href:?}: {err}");
            return None;
        }
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.into()),
        other => {
            log::debug!("dropping href with scheme {other}");
            None
        }
    }
}

/// Canonical form used as the per-user uniqueness key of a saved link.
///
/// - upgrades protocol-relative URLs to https
/// - lowercases the host
/// - strips tracking query parameters (utm_*, fbclid, gclid, ref, mc_*)
/// - removes trailing slashes from the path, keeping the root `/`
///
/// Input that doesn't parse is returned trimmed but otherwise untouched.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let candidate = match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    };

    // Url::parse already lowercases hosts of special schemes
    let mut parsed = match Url::parse(&candidate) {
        Ok(u) => u,
        Err(_) => return url.to_string(),
    };

    if parsed.query().is_some() {
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    parsed.into()
}

use std::collections::HashMap;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::metadata::normalize::{domain_of, resolve_url};
use crate::metadata::types::LinkMetadata;

static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta").expect("Failed to compile meta selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("Failed to compile title selector"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("link[rel][href]").expect("Failed to compile link selector"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("Failed to compile body selector"));

const WORDS_PER_MINUTE: usize = 200;
/// Longest entity name we decode (`#x10FFFF`), plus the `;`
const MAX_ENTITY_LEN: usize = 9;

const TITLE_KEYS: [&str; 2] = ["og:title", "twitter:title"];
const DESCRIPTION_KEYS: [&str; 3] = ["og:description", "twitter:description", "description"];
const IMAGE_KEYS: [&str; 3] = ["og:image", "twitter:image", "twitter:image:src"];
const SITE_NAME_KEYS: [&str; 1] = ["og:site_name"];

/// Extract preview metadata from raw page markup.
///
/// Meta keys are read from either `property` or `name`, so attribute order and
/// quoting don't matter. For every field the first key in its precedence list
/// that carries a non-empty value wins, wherever the tags sit in the document.
pub fn extract(html: &str, source_url: &str) -> LinkMetadata {
    let document = Html::parse_document(html);
    let tags = collect_meta_tags(&document);
    let pick = |keys: &[&str]| keys.iter().find_map(|key| tags.get(*key).cloned());

    let title = pick(&TITLE_KEYS).or_else(|| title_text(&document));
    let description = pick(&DESCRIPTION_KEYS);
    let site_name = pick(&SITE_NAME_KEYS);

    // a broken image reference is dropped rather than replaced by a weaker key
    let thumbnail_url = pick(&IMAGE_KEYS).and_then(|href| resolve_url(source_url, &href));
    let favicon_url = favicon(&document, source_url);
    let reading_time = estimate_reading_time(&document);

    LinkMetadata {
        title,
        description,
        thumbnail_url,
        site_name,
        domain: domain_of(source_url),
        favicon_url,
        reading_time,
    }
}

/// First non-empty `content` per lowercased meta key.
fn collect_meta_tags(document: &Html) -> HashMap<String, String> {
    let mut tags = HashMap::new();

    for element in document.select(&META_SELECTOR) {
        let meta = element.value();
        let Some(content) = meta.attr("content").and_then(clean_text) else {
            continue;
        };

        for key in [meta.attr("property"), meta.attr("name")].into_iter().flatten() {
            let key = key.trim().to_ascii_lowercase();
            if !key.is_empty() {
                tags.entry(key).or_insert_with(|| content.clone());
            }
        }
    }

    tags
}

fn title_text(document: &Html) -> Option<String> {
    document
        .select(&TITLE_SELECTOR)
        .find_map(|element| clean_text(&element.text().collect::<String>()))
}

/// First `<link>` whose rel tokens include `icon` and whose href resolves.
fn favicon(document: &Html, source_url: &str) -> Option<String> {
    document.select(&LINK_SELECTOR).find_map(|element| {
        let link = element.value();
        let is_icon = link
            .attr("rel")?
            .split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("icon"));
        if !is_icon {
            return None;
        }
        resolve_url(source_url, link.attr("href")?)
    })
}

/// Minutes needed to read the visible body text at 200 words per minute,
/// rounded up. `None` for a page without words.
fn estimate_reading_time(document: &Html) -> Option<u32> {
    let body = document.select(&BODY_SELECTOR).next()?;

    let words: usize = body
        .descendants()
        .filter(|node| {
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element())
                .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"));
            !hidden
        })
        .filter_map(|node| node.value().as_text().map(|text| text.split_whitespace().count()))
        .sum();

    if words == 0 {
        return None;
    }
    u32::try_from(words.div_ceil(WORDS_PER_MINUTE)).ok()
}

/// Decode leftover entities and trim. Empty results become `None`.
pub fn clean_text(raw: &str) -> Option<String> {
    let decoded = decode_entities(raw).replace('\u{a0}', " ");
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Single-pass decoder for the named entities pages commonly double-escape
/// plus decimal and hex character references. Unknown entities are kept as is.
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        // only look a few bytes ahead so runs of bare `&` stay linear
        let window = &tail.as_bytes()[1..tail.len().min(MAX_ENTITY_LEN + 1)];
        let decoded = window
            .iter()
            .position(|b| *b == b';')
            .and_then(|end| decode_entity(&tail[1..=end]).map(|ch| (ch, end)));

        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 2..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "quot" => Some('"'),
        "apos" => Some('\''),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "nbsp" => Some(' '),
        _ => {
            let number = name.strip_prefix('#')?;
            let hex = number.strip_prefix('x').or_else(|| number.strip_prefix('X'));
            let code = match hex {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

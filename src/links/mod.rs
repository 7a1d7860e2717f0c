pub mod backend_csv;
pub mod id;

pub use backend_csv::BackendCsv;
pub use id::LinkId;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedLink {
    pub id: LinkId,
    pub user_id: String,
    pub url: String,

    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub site_name: Option<String>,
    pub domain: Option<String>,
    pub favicon: Option<String>,

    pub is_read: bool,
    pub tags: Option<Vec<String>>,
    /// Estimated reading time in minutes
    pub reading_time: Option<u32>,
    pub original_app: Option<String>,
    pub shared_from: Option<String>,

    /// Unix milliseconds
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields of a new record. Id and timestamps are assigned by the store.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LinkCreate {
    pub user_id: String,
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,

    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_from: Option<String>,
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_from: Option<String>,

    /// Stamped by the store with the current time when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl LinkPatch {
    /// True when the patch would change nothing but the timestamp
    pub fn is_noop(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.thumbnail.is_none()
            && self.site_name.is_none()
            && self.domain.is_none()
            && self.favicon.is_none()
            && self.is_read.is_none()
            && self.tags.is_none()
            && self.reading_time.is_none()
            && self.original_app.is_none()
            && self.shared_from.is_none()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("link {0} not found")]
    NotFound(LinkId),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("csv error: {0:?}")]
    Csv(#[from] csv::Error),

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

/// The record store. Ownership checks belong to the caller.
pub trait LinkStore: Send + Sync {
    fn get(&self, id: &LinkId) -> Result<Option<SavedLink>, PersistenceError>;
    fn find_by_url(&self, user_id: &str, url: &str) -> Result<Option<SavedLink>, PersistenceError>;
    fn list(&self, user_id: &str) -> Result<Vec<SavedLink>, PersistenceError>;
    fn insert(&self, link: LinkCreate) -> Result<SavedLink, PersistenceError>;
    /// Patch the record of `link.user_id` saved under `link.url`, or insert
    /// `link` when there is none. Check and write happen atomically.
    fn upsert(&self, link: LinkCreate, patch: LinkPatch) -> Result<SavedLink, PersistenceError>;
    fn patch(&self, id: &LinkId, patch: LinkPatch) -> Result<SavedLink, PersistenceError>;
    fn delete(&self, id: &LinkId) -> Result<(), PersistenceError>;
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A stored text field counts as empty when absent or blank
pub fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Lowercased, trimmed, first occurrence kept. Commas separate tags on disk,
/// so a tag containing one is split.
pub fn dedupe_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .flat_map(|t| t.split(','))
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection() {
        assert!(is_blank(&None));
        assert!(is_blank(&Some("  ".into())));
        assert!(!is_blank(&Some("x".into())));
    }

    #[test]
    fn tags_are_deduped_in_order() {
        let tags = dedupe_tags(vec!["Rust".into(), "web".into(), "rust".into(), " ".into()]);
        assert_eq!(tags, vec!["rust".to_string(), "web".to_string()]);
    }

    #[test]
    fn tags_with_commas_are_split() {
        let tags = dedupe_tags(vec!["c,d".into(), "D".into(), ",".into()]);
        assert_eq!(tags, vec!["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn empty_patch_is_noop() {
        assert!(LinkPatch::default().is_noop());
        assert!(LinkPatch {
            updated_at: Some(1),
            ..Default::default()
        }
        .is_noop());
        assert!(!LinkPatch {
            is_read: Some(true),
            ..Default::default()
        }
        .is_noop());
    }
}

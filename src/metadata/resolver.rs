use std::sync::Arc;

use crate::links::{is_blank, now_millis, LinkId, LinkPatch, LinkStore, PersistenceError, SavedLink};
use crate::metadata::extract::extract;
use crate::metadata::fallback::fallback;
use crate::metadata::fetcher::PageFetcher;
use crate::metadata::platform::classify;
use crate::metadata::types::LinkMetadata;

/// Fetches, extracts and persists link metadata. Never fails the caller:
/// every failure ends in fallback metadata, and persistence errors are only
/// logged.
pub struct Resolver<F> {
    fetcher: Arc<F>,
    store: Arc<dyn LinkStore>,
}

impl<F> Clone for Resolver<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
        }
    }
}

impl<F: PageFetcher> Resolver<F> {
    pub fn new(fetcher: F, store: Arc<dyn LinkStore>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            store,
        }
    }

    /// Resolve metadata for `url` without touching the store.
    pub async fn resolve(&self, url: &str) -> LinkMetadata {
        let info = classify(url);
        if info.platform.skips_fetch() {
            log::info!("url={url} platform={} outcome=short-circuit", info.platform.as_str());
            return fallback(url);
        }

        match self.fetcher.fetch(url).await {
            Ok(html) => {
                let metadata = extract(&html, url);
                if !metadata.has_any_data() {
                    log::debug!("url={url} page carries no preview tags");
                }
                log::info!("url={url} outcome=success fields=[{}]", metadata.describe_fields());
                metadata
            }
            Err(err) => {
                log::warn!("url={url} outcome=fallback err={err}");
                fallback(url)
            }
        }
    }

    /// Resolve metadata for `url` and merge it into the stored record `id`.
    ///
    /// Exactly one merge-write is attempted whatever the fetch outcome. The
    /// metadata is returned even when the write fails.
    pub async fn resolve_and_apply(&self, url: &str, id: &LinkId) -> LinkMetadata {
        let metadata = self.resolve(url).await;

        // the store rewrites its file, keep that off the async workers
        let store = self.store.clone();
        let link_id = id.clone();
        let merged = metadata.clone();
        let written =
            tokio::task::spawn_blocking(move || merge_into(store.as_ref(), &link_id, &merged)).await;

        match written {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => log::warn!("link={id} outcome=persist-failed err={err}"),
            Err(err) => log::error!("link={id} outcome=persist-failed err=merge task: {err}"),
        }

        metadata
    }

    /// Merge-write `metadata` into record `id`: only fields empty on the
    /// stored record are filled.
    pub fn apply(&self, id: &LinkId, metadata: &LinkMetadata) -> Result<SavedLink, PersistenceError> {
        merge_into(self.store.as_ref(), id, metadata)
    }
}

fn merge_into(
    store: &dyn LinkStore,
    id: &LinkId,
    metadata: &LinkMetadata,
) -> Result<SavedLink, PersistenceError> {
    let stored = store
        .get(id)?
        .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;

    let patch = merge_patch(&stored, metadata, now_millis());
    if patch.is_noop() {
        log::debug!("link={id} nothing to fill, stamping updated_at only");
    } else {
        log::debug!("link={id} merge patch={patch:?}");
    }

    store.patch(id, patch)
}

/// Patch that fills every field empty on `stored` and non-empty in
/// `metadata`, stamped with `now`.
pub fn merge_patch(stored: &SavedLink, metadata: &LinkMetadata, now: i64) -> LinkPatch {
    let fill = |current: &Option<String>, candidate: Option<&String>| {
        candidate
            .filter(|value| !value.trim().is_empty() && is_blank(current))
            .cloned()
    };

    LinkPatch {
        title: fill(&stored.title, metadata.title.as_ref()),
        description: fill(&stored.description, metadata.description.as_ref()),
        thumbnail: fill(&stored.thumbnail, metadata.thumbnail_url.as_ref()),
        site_name: fill(&stored.site_name, metadata.site_name.as_ref()),
        domain: fill(&stored.domain, Some(&metadata.domain)),
        favicon: fill(&stored.favicon, metadata.favicon_url.as_ref()),
        reading_time: metadata.reading_time.filter(|_| stored.reading_time.is_none()),
        updated_at: Some(now),
        ..Default::default()
    }
}

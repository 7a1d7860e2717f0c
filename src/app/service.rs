use std::{collections::BTreeSet, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    app::{
        errors::AppError,
        share::{SharePayload, SHARE_ORIGINAL_APP},
    },
    links::{
        dedupe_tags, is_blank, now_millis, LinkCreate, LinkId, LinkPatch, LinkStore, SavedLink,
    },
    metadata::{classify, normalize::domain_of, normalize::normalize_url, shared_from},
};

/// Fields of a save request. `None` fields are left alone when the link
/// already exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkSave {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub reading_time: Option<u32>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub original_app: Option<String>,
    #[serde(default)]
    pub shared_from: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Newest,
    Oldest,
    Title,
    /// Shortest first; links without an estimate go last
    ReadingTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkQuery {
    #[serde(default)]
    pub read: ReadFilter,
    /// Matches links carrying any of these tags
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Case-insensitive substring of title, description or url
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub sort: SortBy,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCounts {
    pub total: usize,
    pub unread: usize,
    pub read: usize,
}

/// Link bookkeeping on top of a [`LinkStore`]. Every operation is scoped to
/// the calling user; touching somebody else's link is `Forbidden`.
#[derive(Clone)]
pub struct LinkService {
    store: Arc<dyn LinkStore>,
    normalize_urls: bool,
}

impl LinkService {
    pub fn new(store: Arc<dyn LinkStore>, normalize_urls: bool) -> Self {
        Self {
            store,
            normalize_urls,
        }
    }

    pub fn store(&self) -> Arc<dyn LinkStore> {
        self.store.clone()
    }

    fn prepare_url(&self, url: &str) -> Result<String, AppError> {
        let url = if self.normalize_urls {
            normalize_url(url)
        } else {
            url.trim().to_string()
        };

        match url::Url::parse(&url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url),
            Ok(parsed) => Err(AppError::InvalidUrl(format!(
                "{url}: unsupported scheme {}",
                parsed.scheme()
            ))),
            Err(err) => Err(AppError::InvalidUrl(format!("{url}: {err}"))),
        }
    }

    fn owned(&self, user_id: &str, id: &LinkId) -> Result<SavedLink, AppError> {
        let link = self.store.get(id)?.ok_or(AppError::NotFound)?;
        if link.user_id != user_id {
            log::warn!("user={user_id} link={id} outcome=forbidden");
            return Err(AppError::Forbidden);
        }
        Ok(link)
    }

    /// Insert a link, or update the provided fields of the link the user
    /// already saved under the same url.
    pub fn save_link(&self, user_id: &str, save: LinkSave) -> Result<SavedLink, AppError> {
        let url = self.prepare_url(&save.url)?;

        // an existing record for (user, url) gets the patch, otherwise the
        // create is inserted; the store decides under one write lock
        let patch = LinkPatch {
            title: save.title.clone(),
            description: save.description.clone(),
            thumbnail: save.thumbnail.clone(),
            site_name: save.site_name.clone(),
            domain: save.domain.clone(),
            favicon: save.favicon.clone(),
            reading_time: save.reading_time,
            tags: save.tags.clone(),
            original_app: save.original_app.clone(),
            shared_from: save.shared_from.clone(),
            ..Default::default()
        };
        let create = LinkCreate {
            user_id: user_id.to_string(),
            url,
            title: save.title,
            description: save.description,
            thumbnail: save.thumbnail,
            site_name: save.site_name,
            domain: save.domain,
            favicon: save.favicon,
            is_read: false,
            tags: save.tags,
            reading_time: save.reading_time,
            original_app: save.original_app,
            shared_from: save.shared_from,
        };

        let link = self.store.upsert(create, patch)?;
        log::info!("user={user_id} link={} saved {}", link.id, link.url);

        Ok(link)
    }

    /// Save `url` with what can be inferred without fetching it: domain,
    /// platform reading time and where it was shared from.
    pub fn save_link_with_metadata(
        &self,
        user_id: &str,
        url: &str,
        original_app: Option<String>,
    ) -> Result<SavedLink, AppError> {
        let url = self.prepare_url(url)?;
        let info = classify(&url);
        let original_app = original_app.filter(|app| !app.trim().is_empty());

        self.save_link(
            user_id,
            LinkSave {
                domain: Some(domain_of(&url)),
                reading_time: Some(info.estimated_reading_time),
                shared_from: Some(shared_from(info.platform, original_app.as_deref())),
                original_app,
                url,
                ..Default::default()
            },
        )
    }

    pub fn save_shared(&self, user_id: &str, payload: &SharePayload) -> Result<SavedLink, AppError> {
        let url = payload
            .url()
            .ok_or_else(|| AppError::InvalidUrl("share payload carries no url".into()))?;

        self.save_link_with_metadata(user_id, &url, Some(SHARE_ORIGINAL_APP.to_string()))
    }

    /// Fill domain, reading time and share source where they are missing.
    pub fn update_link_metadata(&self, user_id: &str, id: &LinkId) -> Result<SavedLink, AppError> {
        let link = self.owned(user_id, id)?;
        Ok(self.store.patch(id, inferred_patch(&link))?)
    }

    /// [`Self::update_link_metadata`] for every link of the user lacking any of
    /// the inferred fields. Returns how many links were inspected.
    pub fn migrate_all_links_metadata(&self, user_id: &str) -> Result<usize, AppError> {
        let links = self.store.list(user_id)?;
        let mut updated = 0;

        for link in links.iter().filter(|l| needs_inferred_fields(l)) {
            self.store.patch(&link.id, inferred_patch(link))?;
            updated += 1;
        }

        log::info!(
            "user={user_id} migrated metadata of {updated} out of {} links",
            links.len()
        );
        Ok(links.len())
    }

    pub fn get_link(&self, user_id: &str, id: &LinkId) -> Result<SavedLink, AppError> {
        self.owned(user_id, id)
    }

    pub fn list_links(&self, user_id: &str, query: &LinkQuery) -> Result<Vec<SavedLink>, AppError> {
        let text = query
            .query
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let tags = query
            .tags
            .clone()
            .map(dedupe_tags)
            .filter(|tags| !tags.is_empty());

        let mut links: Vec<SavedLink> = self
            .store
            .list(user_id)?
            .into_iter()
            .filter(|link| match query.read {
                ReadFilter::All => true,
                ReadFilter::Unread => !link.is_read,
                ReadFilter::Read => link.is_read,
            })
            .filter(|link| match &tags {
                Some(tags) => link
                    .tags
                    .as_ref()
                    .is_some_and(|own| own.iter().any(|t| tags.contains(t))),
                None => true,
            })
            .filter(|link| match &text {
                Some(text) => [&link.title, &link.description]
                    .into_iter()
                    .flatten()
                    .chain(std::iter::once(&link.url))
                    .any(|field| field.to_lowercase().contains(text)),
                None => true,
            })
            .collect();

        match query.sort {
            SortBy::Newest => links.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortBy::Oldest => links.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortBy::Title => links.sort_by_cached_key(|l| {
                l.title
                    .clone()
                    .unwrap_or_else(|| l.url.clone())
                    .to_lowercase()
            }),
            SortBy::ReadingTime => {
                links.sort_by_key(|l| (l.reading_time.is_none(), l.reading_time))
            }
        }

        if let Some(limit) = query.limit {
            links.truncate(limit);
        }

        Ok(links)
    }

    pub fn toggle_read(&self, user_id: &str, id: &LinkId) -> Result<SavedLink, AppError> {
        let link = self.owned(user_id, id)?;
        let patch = LinkPatch {
            is_read: Some(!link.is_read),
            ..Default::default()
        };
        Ok(self.store.patch(id, patch)?)
    }

    pub fn mark_as_read(&self, user_id: &str, id: &LinkId) -> Result<SavedLink, AppError> {
        self.owned(user_id, id)?;
        let patch = LinkPatch {
            is_read: Some(true),
            ..Default::default()
        };
        Ok(self.store.patch(id, patch)?)
    }

    pub fn delete_link(&self, user_id: &str, id: &LinkId) -> Result<(), AppError> {
        self.owned(user_id, id)?;
        self.store.delete(id)?;
        log::info!("user={user_id} link={id} deleted");
        Ok(())
    }

    /// Mark every link of the user unread. Returns how many links were
    /// inspected.
    pub fn reset_all_to_unread(&self, user_id: &str) -> Result<usize, AppError> {
        let links = self.store.list(user_id)?;
        let now = now_millis();

        for link in links.iter().filter(|l| l.is_read) {
            let patch = LinkPatch {
                is_read: Some(false),
                updated_at: Some(now),
                ..Default::default()
            };
            self.store.patch(&link.id, patch)?;
        }

        Ok(links.len())
    }

    /// Distinct tags of the user, sorted
    pub fn tags(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let tags: BTreeSet<String> = self
            .store
            .list(user_id)?
            .into_iter()
            .flat_map(|link| link.tags.unwrap_or_default())
            .collect();

        Ok(tags.into_iter().collect())
    }

    pub fn counts(&self, user_id: &str) -> Result<LinkCounts, AppError> {
        let links = self.store.list(user_id)?;
        let read = links.iter().filter(|l| l.is_read).count();

        Ok(LinkCounts {
            total: links.len(),
            unread: links.len() - read,
            read,
        })
    }
}

fn needs_inferred_fields(link: &SavedLink) -> bool {
    is_blank(&link.domain) || link.reading_time.is_none() || is_blank(&link.shared_from)
}

fn inferred_patch(link: &SavedLink) -> LinkPatch {
    let info = classify(&link.url);

    let mut patch = LinkPatch::default();
    if is_blank(&link.domain) {
        patch.domain = Some(domain_of(&link.url));
    }
    if link.reading_time.is_none() {
        patch.reading_time = Some(info.estimated_reading_time);
    }
    if is_blank(&link.shared_from) {
        patch.shared_from = Some(shared_from(info.platform, link.original_app.as_deref()));
    }
    patch
}

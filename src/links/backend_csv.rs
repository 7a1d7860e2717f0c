use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Instant,
};

use super::{
    dedupe_tags, now_millis, LinkCreate, LinkId, LinkPatch, LinkStore, PersistenceError, SavedLink,
};

const CSV_HEADERS: [&str; 16] = [
    "id",
    "user_id",
    "url",
    "title",
    "description",
    "thumbnail",
    "site_name",
    "domain",
    "favicon",
    "is_read",
    "tags",
    "reading_time",
    "original_app",
    "shared_from",
    "created_at",
    "updated_at",
];

/// Link store kept in memory and persisted to a single csv file, rewritten
/// atomically (temp file + rename) after every mutation.
#[derive(Debug, Clone)]
pub struct BackendCsv {
    list: Arc<RwLock<Vec<SavedLink>>>,
    path: PathBuf,
}

fn opt(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_tags(value: &str) -> Option<Vec<String>> {
    if value.is_empty() {
        return None;
    }
    Some(
        value
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn read_row(record: &csv::StringRecord) -> Result<SavedLink, PersistenceError> {
    let field = |idx: usize| {
        record
            .get(idx)
            .ok_or_else(|| PersistenceError::Corrupt(format!("missing column {}", CSV_HEADERS[idx])))
    };
    let number = |idx: usize| -> Result<i64, PersistenceError> {
        field(idx)?
            .parse::<i64>()
            .map_err(|e| PersistenceError::Corrupt(format!("{}: {e}", CSV_HEADERS[idx])))
    };

    let reading_time = match field(11)? {
        "" => None,
        value => Some(
            value
                .parse::<u32>()
                .map_err(|e| PersistenceError::Corrupt(format!("reading_time: {e}")))?,
        ),
    };

    Ok(SavedLink {
        id: LinkId::from(field(0)?),
        user_id: field(1)?.to_string(),
        url: field(2)?.to_string(),
        title: opt(field(3)?),
        description: opt(field(4)?),
        thumbnail: opt(field(5)?),
        site_name: opt(field(6)?),
        domain: opt(field(7)?),
        favicon: opt(field(8)?),
        is_read: field(9)? == "true",
        tags: parse_tags(field(10)?),
        reading_time,
        original_app: opt(field(12)?),
        shared_from: opt(field(13)?),
        created_at: number(14)?,
        updated_at: number(15)?,
    })
}

fn write_row(link: &SavedLink) -> [String; 16] {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    [
        link.id.to_string(),
        link.user_id.clone(),
        link.url.clone(),
        text(&link.title),
        text(&link.description),
        text(&link.thumbnail),
        text(&link.site_name),
        text(&link.domain),
        text(&link.favicon),
        link.is_read.to_string(),
        link.tags.as_ref().map(|t| t.join(",")).unwrap_or_default(),
        link.reading_time.map(|r| r.to_string()).unwrap_or_default(),
        text(&link.original_app),
        text(&link.shared_from),
        link.created_at.to_string(),
        link.updated_at.to_string(),
    ]
}

impl BackendCsv {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if let Err(err) = std::fs::metadata(path) {
            match err.kind() {
                ErrorKind::NotFound => {
                    log::info!("Creating new link store at {}", path.display());
                    let mut csv_wrt = csv::Writer::from_path(path)?;
                    csv_wrt.write_record(CSV_HEADERS)?;
                    csv_wrt.flush()?;
                }
                _ => Err(err)?,
            }
        }

        let now = Instant::now();
        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut links = vec![];
        for record in csv_reader.records() {
            links.push(read_row(&record?)?);
        }

        log::debug!(
            "took {}ms to read {} links",
            now.elapsed().as_micros() as f64 / 1000.0,
            links.len()
        );

        Ok(BackendCsv {
            list: Arc::new(RwLock::new(links)),
            path: path.to_path_buf(),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<SavedLink>>, PersistenceError> {
        self.list
            .read()
            .map_err(|_| PersistenceError::Corrupt("link list lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<SavedLink>>, PersistenceError> {
        self.list
            .write()
            .map_err(|_| PersistenceError::Corrupt("link list lock poisoned".into()))
    }

    fn save(&self, links: &[SavedLink]) -> Result<(), PersistenceError> {
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push("-tmp");

        let mut csv_wrt = csv::Writer::from_path(&temp_path)?;
        csv_wrt.write_record(CSV_HEADERS)?;
        for link in links {
            csv_wrt.write_record(write_row(link))?;
        }
        csv_wrt.flush()?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Persist `next` and only then make it the in-memory list, so a failed
    /// write leaves both untouched.
    fn commit(&self, links: &mut Vec<SavedLink>, next: Vec<SavedLink>) -> Result<(), PersistenceError> {
        self.save(&next)?;
        *links = next;
        Ok(())
    }
}

fn new_link(create: LinkCreate) -> SavedLink {
    let now = now_millis();
    SavedLink {
        id: LinkId::generate(),
        user_id: create.user_id,
        url: create.url,
        title: create.title,
        description: create.description,
        thumbnail: create.thumbnail,
        site_name: create.site_name,
        domain: create.domain,
        favicon: create.favicon,
        is_read: create.is_read,
        tags: create.tags.map(dedupe_tags),
        reading_time: create.reading_time,
        original_app: create.original_app,
        shared_from: create.shared_from,
        created_at: now,
        updated_at: now,
    }
}

fn apply_patch(link: &mut SavedLink, patch: LinkPatch) {
    if let Some(title) = patch.title {
        link.title = Some(title);
    }
    if let Some(description) = patch.description {
        link.description = Some(description);
    }
    if let Some(thumbnail) = patch.thumbnail {
        link.thumbnail = Some(thumbnail);
    }
    if let Some(site_name) = patch.site_name {
        link.site_name = Some(site_name);
    }
    if let Some(domain) = patch.domain {
        link.domain = Some(domain);
    }
    if let Some(favicon) = patch.favicon {
        link.favicon = Some(favicon);
    }
    if let Some(is_read) = patch.is_read {
        link.is_read = is_read;
    }
    if let Some(tags) = patch.tags {
        link.tags = Some(dedupe_tags(tags));
    }
    if let Some(reading_time) = patch.reading_time {
        link.reading_time = Some(reading_time);
    }
    if let Some(original_app) = patch.original_app {
        link.original_app = Some(original_app);
    }
    if let Some(shared_from) = patch.shared_from {
        link.shared_from = Some(shared_from);
    }
    link.updated_at = patch.updated_at.unwrap_or_else(now_millis);
}

impl LinkStore for BackendCsv {
    fn get(&self, id: &LinkId) -> Result<Option<SavedLink>, PersistenceError> {
        Ok(self.read()?.iter().find(|l| &l.id == id).cloned())
    }

    fn find_by_url(&self, user_id: &str, url: &str) -> Result<Option<SavedLink>, PersistenceError> {
        Ok(self
            .read()?
            .iter()
            .find(|l| l.user_id == user_id && l.url == url)
            .cloned())
    }

    fn list(&self, user_id: &str) -> Result<Vec<SavedLink>, PersistenceError> {
        Ok(self
            .read()?
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    fn insert(&self, create: LinkCreate) -> Result<SavedLink, PersistenceError> {
        let link = new_link(create);

        let mut links = self.write()?;
        let mut next = links.clone();
        next.push(link.clone());
        self.commit(&mut links, next)?;

        Ok(link)
    }

    fn upsert(&self, create: LinkCreate, patch: LinkPatch) -> Result<SavedLink, PersistenceError> {
        let mut links = self.write()?;
        let mut next = links.clone();

        let existing = next
            .iter()
            .position(|l| l.user_id == create.user_id && l.url == create.url);

        let link = match existing {
            Some(idx) => {
                apply_patch(&mut next[idx], patch);
                next[idx].clone()
            }
            None => {
                let link = new_link(create);
                next.push(link.clone());
                link
            }
        };
        self.commit(&mut links, next)?;

        Ok(link)
    }

    fn patch(&self, id: &LinkId, patch: LinkPatch) -> Result<SavedLink, PersistenceError> {
        let mut links = self.write()?;
        let mut next = links.clone();

        let link = next
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
        apply_patch(link, patch);
        let link = link.clone();

        self.commit(&mut links, next)?;

        Ok(link)
    }

    fn delete(&self, id: &LinkId) -> Result<(), PersistenceError> {
        let mut links = self.write()?;
        let mut next = links.clone();

        let idx = next
            .iter()
            .position(|l| &l.id == id)
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
        next.remove(idx);

        self.commit(&mut links, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (BackendCsv, tempfile::TempDir) {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let store = BackendCsv::load(tmp.path().join("links.csv")).expect("failed to load store");
        (store, tmp)
    }

    #[test]
    fn insert_assigns_id_and_timestamps() {
        let (store, _tmp) = store();
        let link = store
            .insert(LinkCreate {
                user_id: "u1".into(),
                url: "https://example.com".into(),
                ..Default::default()
            })
            .unwrap();

        assert!(!link.id.is_empty());
        assert!(!link.is_read);
        assert!(link.created_at > 0);
        assert_eq!(link.created_at, link.updated_at);
        assert_eq!(store.get(&link.id).unwrap(), Some(link));
    }

    #[test]
    fn survives_reload() {
        let (store, tmp) = store();
        let link = store
            .insert(LinkCreate {
                user_id: "u1".into(),
                url: "https://example.com/a".into(),
                title: Some("Quotes \"and\", commas".into()),
                tags: Some(vec!["rust".into(), "web".into()]),
                reading_time: Some(8),
                shared_from: Some("Safari".into()),
                ..Default::default()
            })
            .unwrap();

        let reloaded = BackendCsv::load(tmp.path().join("links.csv")).unwrap();
        assert_eq!(reloaded.get(&link.id).unwrap(), Some(link));
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let (store, _tmp) = store();
        let link = store
            .insert(LinkCreate {
                user_id: "u1".into(),
                url: "https://example.com".into(),
                title: Some("Keep".into()),
                ..Default::default()
            })
            .unwrap();

        let patched = store
            .patch(
                &link.id,
                LinkPatch {
                    description: Some("New".into()),
                    updated_at: Some(link.updated_at + 5),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(patched.title.as_deref(), Some("Keep"));
        assert_eq!(patched.description.as_deref(), Some("New"));
        assert_eq!(patched.updated_at, link.updated_at + 5);
    }

    #[test]
    fn patch_and_delete_missing_record() {
        let (store, _tmp) = store();
        let missing = LinkId::from("nope");
        assert!(matches!(
            store.patch(&missing, LinkPatch::default()),
            Err(PersistenceError::NotFound(_))
        ));
        assert!(matches!(store.delete(&missing), Err(PersistenceError::NotFound(_))));
    }

    #[test]
    fn find_by_url_is_scoped_to_user() {
        let (store, _tmp) = store();
        store
            .insert(LinkCreate {
                user_id: "u1".into(),
                url: "https://example.com".into(),
                ..Default::default()
            })
            .unwrap();

        assert!(store.find_by_url("u1", "https://example.com").unwrap().is_some());
        assert!(store.find_by_url("u2", "https://example.com").unwrap().is_none());
        assert_eq!(store.list("u2").unwrap().len(), 0);
    }

    #[test]
    fn comma_tags_survive_reload() {
        let (store, tmp) = store();
        let link = store
            .insert(LinkCreate {
                user_id: "u1".into(),
                url: "https://example.com".into(),
                tags: Some(vec!["c,d".into(), "e".into()]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(link.tags, Some(vec!["c".to_string(), "d".to_string(), "e".to_string()]));

        let reloaded = BackendCsv::load(tmp.path().join("links.csv")).unwrap();
        assert_eq!(reloaded.get(&link.id).unwrap(), Some(link));
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let (store, tmp) = store();
        let link = store
            .insert(LinkCreate {
                user_id: "u1".into(),
                url: "https://example.com/a".into(),
                title: Some("Before".into()),
                ..Default::default()
            })
            .unwrap();

        // a non-empty directory in place of the csv makes the rename fail
        let path = tmp.path().join("links.csv");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("blocker"), "x").unwrap();

        let inserted = store.insert(LinkCreate {
            user_id: "u1".into(),
            url: "https://example.com/b".into(),
            ..Default::default()
        });
        assert!(inserted.is_err());

        let patched = store.patch(
            &link.id,
            LinkPatch {
                title: Some("After".into()),
                ..Default::default()
            },
        );
        assert!(patched.is_err());
        assert!(store.delete(&link.id).is_err());

        assert_eq!(store.list("u1").unwrap(), vec![link]);
    }

    #[test]
    fn concurrent_upserts_keep_one_record() {
        let (store, _tmp) = store();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    store
                        .upsert(
                            LinkCreate {
                                user_id: "u1".into(),
                                url: "https://example.com".into(),
                                ..Default::default()
                            },
                            LinkPatch {
                                title: Some(format!("save {i}")),
                                ..Default::default()
                            },
                        )
                        .unwrap();
                });
            }
        });

        assert_eq!(store.list("u1").unwrap().len(), 1);
    }
}

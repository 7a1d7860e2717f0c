use super::fresh_store;
use crate::app::{AppError, LinkQuery, LinkSave, LinkService, ReadFilter, SharePayload, SortBy};
use crate::links::{LinkId, LinkPatch};

fn fresh_service() -> (LinkService, tempfile::TempDir) {
    let (store, tmp) = fresh_store();
    (LinkService::new(store, true), tmp)
}

fn seed(service: &LinkService, user: &str, count: usize) -> Vec<LinkId> {
    (0..count)
        .map(|i| {
            service
                .save_link(
                    user,
                    LinkSave {
                        url: format!("https://example.com/{i}"),
                        title: Some(format!("Title {i}")),
                        tags: Some(vec!["all".to_string(), format!("tag{i}")]),
                        reading_time: Some(10 - i as u32),
                        ..Default::default()
                    },
                )
                .unwrap()
                .id
        })
        .collect()
}

// --- save ---

#[test]
fn resave_updates_instead_of_duplicating() {
    let (service, _tmp) = fresh_service();
    let first = service
        .save_link(
            "u1",
            LinkSave {
                url: "https://example.com/a/?utm_source=feed".into(),
                title: Some("First".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(first.url, "https://example.com/a");
    assert!(!first.is_read);

    let second = service
        .save_link(
            "u1",
            LinkSave {
                url: "https://example.com/a".into(),
                description: Some("Now with description".into()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.title.as_deref(), Some("First"));
    assert_eq!(second.description.as_deref(), Some("Now with description"));
    assert_eq!(service.list_links("u1", &LinkQuery::default()).unwrap().len(), 1);
}

#[test]
fn concurrent_saves_of_one_url_make_one_record() {
    let (service, _tmp) = fresh_service();

    std::thread::scope(|scope| {
        for i in 0..8 {
            let service = &service;
            scope.spawn(move || {
                service
                    .save_link(
                        "u1",
                        LinkSave {
                            url: "https://example.com/race".into(),
                            tags: Some(vec![format!("t{i}")]),
                            ..Default::default()
                        },
                    )
                    .unwrap();
            });
        }
    });

    assert_eq!(service.list_links("u1", &LinkQuery::default()).unwrap().len(), 1);
}

#[test]
fn same_url_for_different_users_is_separate() {
    let (service, _tmp) = fresh_service();
    let a = service
        .save_link_with_metadata("u1", "https://example.com", None)
        .unwrap();
    let b = service
        .save_link_with_metadata("u2", "https://example.com", None)
        .unwrap();
    assert_ne!(a.id, b.id);
}

#[test]
fn rejects_non_http_urls() {
    let (service, _tmp) = fresh_service();
    for url in ["ftp://example.com/file", "not a url", ""] {
        assert!(matches!(
            service.save_link_with_metadata("u1", url, None),
            Err(AppError::InvalidUrl(_))
        ));
    }
}

#[test]
fn save_with_metadata_infers_platform_fields() {
    let (service, _tmp) = fresh_service();

    let tweet = service
        .save_link_with_metadata("u1", "https://x.com/alice/status/1", Some("Tweetbot".into()))
        .unwrap();
    assert_eq!(tweet.domain.as_deref(), Some("x.com"));
    assert_eq!(tweet.reading_time, Some(1));
    assert_eq!(tweet.shared_from.as_deref(), Some("X (Twitter)"));
    assert_eq!(tweet.original_app.as_deref(), Some("Tweetbot"));

    let video = service
        .save_link_with_metadata("u1", "https://youtu.be/xyz", None)
        .unwrap();
    assert_eq!(video.reading_time, Some(10));
    assert_eq!(video.shared_from.as_deref(), Some("Safari"));

    let blog = service
        .save_link_with_metadata("u1", "https://blog.example.org/post", Some("Reeder".into()))
        .unwrap();
    assert_eq!(blog.reading_time, Some(5));
    assert_eq!(blog.shared_from.as_deref(), Some("Reeder"));
}

#[test]
fn share_payload_saves_first_url_in_text() {
    let (service, _tmp) = fresh_service();
    let link = service
        .save_shared(
            "u1",
            &SharePayload {
                web_url: None,
                text: Some("look at this https://medium.com/p/123 !".into()),
            },
        )
        .unwrap();

    assert_eq!(link.url, "https://medium.com/p/123");
    assert_eq!(link.original_app.as_deref(), Some("Shared"));
    assert_eq!(link.reading_time, Some(8));

    assert!(matches!(
        service.save_shared("u1", &SharePayload::default()),
        Err(AppError::InvalidUrl(_))
    ));
}

// --- ownership ---

#[test]
fn other_users_links_are_forbidden() {
    let (service, _tmp) = fresh_service();
    let ids = seed(&service, "u1", 1);

    assert!(matches!(service.get_link("u2", &ids[0]), Err(AppError::Forbidden)));
    assert!(matches!(service.toggle_read("u2", &ids[0]), Err(AppError::Forbidden)));
    assert!(matches!(service.delete_link("u2", &ids[0]), Err(AppError::Forbidden)));
    assert!(matches!(
        service.get_link("u1", &LinkId::from("missing")),
        Err(AppError::NotFound)
    ));
    assert!(service.get_link("u1", &ids[0]).is_ok());
}

// --- read state ---

#[test]
fn toggle_mark_and_reset() {
    let (service, _tmp) = fresh_service();
    let ids = seed(&service, "u1", 3);

    assert!(service.toggle_read("u1", &ids[0]).unwrap().is_read);
    assert!(!service.toggle_read("u1", &ids[0]).unwrap().is_read);
    assert!(service.mark_as_read("u1", &ids[1]).unwrap().is_read);
    assert!(service.mark_as_read("u1", &ids[1]).unwrap().is_read);

    let counts = service.counts("u1").unwrap();
    assert_eq!((counts.total, counts.read, counts.unread), (3, 1, 2));

    assert_eq!(service.reset_all_to_unread("u1").unwrap(), 3);
    assert_eq!(service.counts("u1").unwrap().read, 0);
}

#[test]
fn delete_removes_link() {
    let (service, _tmp) = fresh_service();
    let ids = seed(&service, "u1", 2);

    service.delete_link("u1", &ids[0]).unwrap();
    assert!(matches!(service.get_link("u1", &ids[0]), Err(AppError::NotFound)));
    assert_eq!(service.counts("u1").unwrap().total, 1);
}

// --- listing ---

#[test]
fn list_filters_and_sorts() {
    let (service, _tmp) = fresh_service();
    let ids = seed(&service, "u1", 3);
    seed(&service, "u2", 2);
    service.mark_as_read("u1", &ids[2]).unwrap();

    let unread = service
        .list_links(
            "u1",
            &LinkQuery {
                read: ReadFilter::Unread,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(unread.len(), 2);

    let tagged = service
        .list_links(
            "u1",
            &LinkQuery {
                tags: Some(vec!["TAG1".into(), "nope".into()]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, ids[1]);

    let searched = service
        .list_links(
            "u1",
            &LinkQuery {
                query: Some("title 2".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].id, ids[2]);

    let by_reading_time = service
        .list_links(
            "u1",
            &LinkQuery {
                sort: SortBy::ReadingTime,
                limit: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
    let times: Vec<_> = by_reading_time.iter().map(|l| l.reading_time).collect();
    assert_eq!(times, vec![Some(8), Some(9)]);

    let by_title = service
        .list_links(
            "u1",
            &LinkQuery {
                sort: SortBy::Title,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(by_title[0].title.as_deref(), Some("Title 0"));
}

#[test]
fn tags_are_distinct_and_sorted() {
    let (service, _tmp) = fresh_service();
    seed(&service, "u1", 2);
    assert_eq!(service.tags("u1").unwrap(), vec!["all", "tag0", "tag1"]);
    assert!(service.tags("u2").unwrap().is_empty());
}

// --- metadata migration ---

#[test]
fn migration_fills_only_missing_fields() {
    let (service, _tmp) = fresh_service();
    let ids = seed(&service, "u1", 2);
    let store = service.store();

    store
        .patch(
            &ids[0],
            LinkPatch {
                shared_from: Some("Reeder".into()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(service.migrate_all_links_metadata("u1").unwrap(), 2);

    let first = service.get_link("u1", &ids[0]).unwrap();
    assert_eq!(first.domain.as_deref(), Some("example.com"));
    assert_eq!(first.reading_time, Some(10));
    assert_eq!(first.shared_from.as_deref(), Some("Reeder"));

    let second = service.get_link("u1", &ids[1]).unwrap();
    assert_eq!(second.shared_from.as_deref(), Some("Safari"));

    let single = service.update_link_metadata("u1", &ids[1]).unwrap();
    assert_eq!(single.domain.as_deref(), Some("example.com"));
    assert!(matches!(
        service.update_link_metadata("u2", &ids[1]),
        Err(AppError::Forbidden)
    ));
}

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbImage};
use propsync_core::{
    DictionaryTable, EntityId, EntityKind, MetaKey, RawRecord, SyncOutcome, Taxonomy,
};
use propsync_mapping::PropertyMapper;
use propsync_storage::{ContentStore, LocalContentStore, StaticMediaSource};
use propsync_sync::{BatchDriver, SyncSelection};
use serde_json::json;
use tempfile::tempdir;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

fn picture(n: usize) -> String {
    format!("https://cdn.example.test/img/{n}.png")
}

fn media(count: usize) -> StaticMediaSource {
    (1..=count).fold(StaticMediaSource::new(), |media, n| {
        media.with_item(picture(n), png_bytes(40, 30))
    })
}

fn listing(id: i64, title: &str, pictures: &[usize]) -> Option<RawRecord> {
    let pictures: Vec<String> = pictures.iter().copied().map(picture).collect();
    RawRecord::from_value(json!({
        "id": id,
        "portalTitle": title,
        "price": "250000",
        "locationCityName": "Gdańsk",
        "transaction": 131,
        "pictures": pictures,
    }))
}

async fn open_store(dir: &Path, media: StaticMediaSource) -> LocalContentStore {
    LocalContentStore::open(dir, Arc::new(media))
        .await
        .expect("open store")
}

fn success_id(outcome: &SyncOutcome) -> EntityId {
    match outcome {
        SyncOutcome::Success(id) => *id,
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn second_run_updates_instead_of_duplicating() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), media(2)).await;
    let mapper = PropertyMapper::default();
    let dictionary = DictionaryTable::new();
    let driver = BatchDriver::new(&store, &mapper, &dictionary);

    let first = driver
        .run(vec![listing(77, "Flat by the sea", &[1, 2])], SyncSelection::default(), false)
        .await;
    let entity = success_id(&first.outcomes[0].outcome);

    let second = driver
        .run(vec![listing(77, "Flat by the sea, renovated", &[1, 2])], SyncSelection::default(), false)
        .await;
    assert_eq!(success_id(&second.outcomes[0].outcome), entity);
    assert_eq!(store.entity_count(EntityKind::Property).await, 1);
    assert_eq!(store.entity_count(EntityKind::Attachment).await, 2);

    let stored = store.entity(entity).await.expect("entity");
    assert_eq!(stored.title, "Flat by the sea, renovated");
    assert_eq!(stored.terms.get(&Taxonomy::City), Some(&vec!["Gdańsk".to_string()]));
    assert_eq!(
        store
            .get_metadata(entity, MetaKey::JsonId.as_str())
            .await
            .expect("meta")
            .map(|v| v.text_form()),
        Some("77".to_string())
    );
}

#[tokio::test]
async fn shared_picture_urls_reuse_one_attachment() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), media(1)).await;
    let mapper = PropertyMapper::default();
    let dictionary = DictionaryTable::new();
    let report = BatchDriver::new(&store, &mapper, &dictionary)
        .run(
            vec![listing(1, "First flat", &[1]), listing(2, "Second flat", &[1])],
            SyncSelection::default(),
            false,
        )
        .await;

    assert_eq!(report.success, 2);
    assert_eq!(store.entity_count(EntityKind::Attachment).await, 1);

    let first = success_id(&report.outcomes[0].outcome);
    let second = success_id(&report.outcomes[1].outcome);
    let featured_first = store.featured_image(first).await.expect("featured");
    let featured_second = store.featured_image(second).await.expect("featured");
    assert!(featured_first.is_some());
    assert_eq!(featured_first, featured_second);
}

#[tokio::test]
async fn gallery_shrinks_with_the_feed() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), media(5)).await;
    let mapper = PropertyMapper::default();
    let dictionary = DictionaryTable::new();
    let driver = BatchDriver::new(&store, &mapper, &dictionary);

    let report = driver
        .run(vec![listing(9, "Loft", &[1, 2, 3, 4, 5])], SyncSelection::default(), false)
        .await;
    let entity = success_id(&report.outcomes[0].outcome);
    assert_eq!(store.gallery_attachments(entity).await.expect("gallery").len(), 5);

    driver
        .run(vec![listing(9, "Loft", &[4, 5])], SyncSelection::default(), false)
        .await;
    assert_eq!(store.gallery_attachments(entity).await.expect("gallery").len(), 2);
    assert_eq!(
        store
            .get_metadata(entity, MetaKey::GalleryImageCount.as_str())
            .await
            .expect("meta")
            .and_then(|v| v.as_int()),
        Some(2)
    );

    driver
        .run(vec![listing(9, "Loft", &[])], SyncSelection::default(), false)
        .await;
    assert!(store.gallery_attachments(entity).await.expect("gallery").is_empty());
    assert_eq!(
        store
            .get_metadata(entity, MetaKey::GalleryImageCount.as_str())
            .await
            .expect("meta"),
        None
    );
    // Attachments themselves are never deleted.
    assert_eq!(store.entity_count(EntityKind::Attachment).await, 5);
}

#[tokio::test]
async fn every_record_gets_exactly_one_outcome() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), StaticMediaSource::new()).await;
    let mapper = PropertyMapper::default();
    let dictionary = DictionaryTable::new();

    let records = vec![
        listing(1, "Good flat", &[]),
        RawRecord::from_value(json!({"portalTitle": "No identifier"})),
        None,
        RawRecord::from_value(json!({"id": "  ", "portalTitle": "Blank identifier"})),
        RawRecord::from_value(json!({"id": 4, "portalTitle": "<br/>"})),
    ];
    let report = BatchDriver::new(&store, &mapper, &dictionary)
        .run(records, SyncSelection::default(), false)
        .await;

    assert_eq!(report.outcomes.len(), 5);
    assert_eq!((report.success, report.skipped, report.error), (1, 1, 3));
    assert_eq!(
        report.outcomes[1].outcome,
        SyncOutcome::Error("Invalid item structure".to_string())
    );
    assert_eq!(report.outcomes[1].item_id, "unknown");
    assert_eq!(
        report.outcomes[3].outcome,
        SyncOutcome::Error("Item data is missing a unique ID.".to_string())
    );
    assert_eq!(report.outcomes[4].outcome, SyncOutcome::Skipped);
    assert!(report
        .messages
        .contains(&"Item ID 4 skipped during sync processing.".to_string()));
    assert_eq!(store.entity_count(EntityKind::Property).await, 1);
}

#[tokio::test]
async fn broken_pictures_do_not_fail_the_record() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), media(1)).await;
    let mapper = PropertyMapper::default();
    let dictionary = DictionaryTable::new();

    // Picture 3 is unknown to the media source and answers 404.
    let report = BatchDriver::new(&store, &mapper, &dictionary)
        .run(vec![listing(5, "Cottage", &[3, 1])], SyncSelection::default(), false)
        .await;
    let entity = success_id(&report.outcomes[0].outcome);
    assert_eq!(store.gallery_attachments(entity).await.expect("gallery").len(), 1);
    assert_eq!(store.featured_image(entity).await.expect("featured"), None);
}

#[tokio::test]
async fn failed_featured_image_falls_back_to_default_thumbnail() {
    let dir = tempdir().expect("tempdir");
    let placeholder = dir.path().join("placeholder.png");
    std::fs::write(&placeholder, png_bytes(20, 20)).expect("placeholder");
    let store = open_store(&dir.path().join("store"), StaticMediaSource::new()).await;
    let mapper = PropertyMapper::default();
    let dictionary = DictionaryTable::new();
    let driver = BatchDriver::new(&store, &mapper, &dictionary).with_default_thumbnail(Some(placeholder));

    let report = driver
        .run(
            vec![listing(1, "House one", &[8]), listing(2, "House two", &[9])],
            SyncSelection::default(),
            false,
        )
        .await;
    let first = success_id(&report.outcomes[0].outcome);
    let second = success_id(&report.outcomes[1].outcome);

    let featured = store.featured_image(first).await.expect("featured");
    assert!(featured.is_some());
    assert_eq!(store.featured_image(second).await.expect("featured"), featured);
    assert_eq!(store.entity_count(EntityKind::Attachment).await, 1);
}

#[tokio::test]
async fn duplicate_titles_are_dropped_before_processing() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), StaticMediaSource::new()).await;
    let mapper = PropertyMapper::default();
    let dictionary = DictionaryTable::new();
    let driver = BatchDriver::new(&store, &mapper, &dictionary);

    driver
        .run(vec![listing(1, "Known flat", &[])], SyncSelection::default(), false)
        .await;

    let report = driver
        .run(
            vec![
                listing(2, "Known flat", &[]),
                listing(3, "Fresh flat", &[]),
                RawRecord::from_value(json!({"id": 4})),
            ],
            SyncSelection::default(),
            true,
        )
        .await;

    let stats = report.duplicate_filter.expect("stats");
    assert_eq!(stats.original_count, 3);
    assert_eq!(stats.after_filter_count, 2);
    assert_eq!(stats.filtered_out_count, 1);
    assert_eq!(stats.without_title_count, 1);
    assert_eq!(report.success, 2);
    assert!(report.messages.contains(
        &"Duplicate Filter: 3 items retrieved, 2 after filtering, 1 filtered out as duplicates".to_string()
    ));
    assert!(report
        .messages
        .contains(&"Debug: Skip duplicates: Yes".to_string()));
}

#[tokio::test]
async fn range_selection_processes_inclusive_slice() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), StaticMediaSource::new()).await;
    let mapper = PropertyMapper::default();
    let dictionary = DictionaryTable::new();

    let records = (1..=6).map(|n| listing(n, &format!("Flat {n}"), &[])).collect();
    let report = BatchDriver::new(&store, &mapper, &dictionary)
        .run(records, SyncSelection::range(1, 3).expect("range"), false)
        .await;

    let ids: Vec<&str> = report.outcomes.iter().map(|o| o.item_id.as_str()).collect();
    assert_eq!(ids, ["2", "3", "4"]);
    assert_eq!(report.messages[1], "Debug: Sync mode: range");
    assert_eq!(report.messages[2], "Debug: Range requested: 1 to 3");
}

#[tokio::test]
async fn empty_feed_is_reported() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), StaticMediaSource::new()).await;
    let mapper = PropertyMapper::default();
    let dictionary = DictionaryTable::new();

    let report = BatchDriver::new(&store, &mapper, &dictionary)
        .with_feed_path(dir.path().join("missing.json"))
        .run(Vec::new(), SyncSelection::default(), false)
        .await;

    assert_eq!(report.total(), 0);
    assert!(report.messages.contains(
        &"No data items found to process or error reading data source.".to_string()
    ));
    assert!(report
        .messages
        .contains(&"Debug: JSON file exists: No".to_string()));
}

#[tokio::test]
async fn zero_padded_ids_match_on_the_next_run() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), StaticMediaSource::new()).await;
    let mapper = PropertyMapper::default();
    let dictionary = DictionaryTable::new();
    let driver = BatchDriver::new(&store, &mapper, &dictionary);
    let padded = || RawRecord::from_value(json!({"id": "042", "portalTitle": "Padded flat"}));

    let first = driver.run(vec![padded()], SyncSelection::default(), false).await;
    let second = driver.run(vec![padded()], SyncSelection::default(), false).await;

    let entity = success_id(&first.outcomes[0].outcome);
    assert_eq!(success_id(&second.outcomes[0].outcome), entity);
    assert_eq!(store.entity_count(EntityKind::Property).await, 1);
    assert_eq!(
        store
            .get_metadata(entity, MetaKey::JsonId.as_str())
            .await
            .expect("meta")
            .map(|v| v.text_form()),
        Some("042".to_string())
    );
}

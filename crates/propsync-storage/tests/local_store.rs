use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbImage};
use propsync_core::{EntityId, EntityKind, MetaKey, MetaValue, PostFields, Taxonomy};
use propsync_storage::{
    ContentStore, EntityQuery, LocalContentStore, StaticMediaSource, StoreError,
};
use tempfile::tempdir;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

fn property(title: &str) -> PostFields {
    PostFields {
        title: title.to_string(),
        content: "<p>body</p>".to_string(),
        ..PostFields::default()
    }
}

async fn open_store(dir: &std::path::Path, media: StaticMediaSource) -> LocalContentStore {
    LocalContentStore::open(dir, Arc::new(media))
        .await
        .expect("open store")
}

#[tokio::test]
async fn metadata_lookup_finds_properties_and_skips_trash() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), StaticMediaSource::new()).await;

    let first = store.create_entity(&property("Flat A")).await.expect("create");
    let second = store.create_entity(&property("Flat B")).await.expect("create");
    store
        .set_metadata(first, MetaKey::JsonId.as_str(), MetaValue::Int(7))
        .await
        .expect("meta");
    store
        .set_metadata(second, MetaKey::JsonId.as_str(), MetaValue::from("8"))
        .await
        .expect("meta");

    let by_int = store
        .find_entities(&EntityQuery::meta_equals(EntityKind::Property, MetaKey::JsonId, "7"))
        .await
        .expect("query");
    assert_eq!(by_int, vec![first]);

    let by_title = store
        .find_entities(&EntityQuery::title_equals(EntityKind::Property, "Flat B"))
        .await
        .expect("query");
    assert_eq!(by_title, vec![second]);

    let case_sensitive = store
        .find_entities(&EntityQuery::title_equals(EntityKind::Property, "flat b"))
        .await
        .expect("query");
    assert!(case_sensitive.is_empty());

    store.trash_entity(second).await.expect("trash");
    let trashed = store
        .find_entities(&EntityQuery::title_equals(EntityKind::Property, "Flat B"))
        .await
        .expect("query");
    assert!(trashed.is_empty());
}

#[tokio::test]
async fn set_metadata_overwrites_repeated_entries() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), StaticMediaSource::new()).await;
    let id = store.create_entity(&property("Flat A")).await.expect("create");

    assert!(store.add_metadata(id, "note", MetaValue::from("a"), false).await.expect("add"));
    assert!(store.add_metadata(id, "note", MetaValue::from("b"), false).await.expect("add"));
    assert!(!store.add_metadata(id, "note", MetaValue::from("c"), true).await.expect("add"));
    assert_eq!(store.get_metadata_values(id, "note").await.expect("get").len(), 2);

    store.set_metadata(id, "note", MetaValue::from("z")).await.expect("set");
    assert_eq!(
        store.get_metadata_values(id, "note").await.expect("get"),
        vec![MetaValue::from("z")]
    );
    assert_eq!(store.delete_metadata(id, "note").await.expect("delete"), 1);
    assert_eq!(store.get_metadata(id, "note").await.expect("get"), None);
}

#[tokio::test]
async fn taxonomy_terms_replace_unless_appending() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), StaticMediaSource::new()).await;
    let id = store.create_entity(&property("Flat A")).await.expect("create");

    let first = vec!["Balcony".to_string(), "Gym".to_string()];
    store
        .set_taxonomy_terms(id, Taxonomy::Feature, &first, false)
        .await
        .expect("terms");
    store
        .set_taxonomy_terms(id, Taxonomy::Feature, &["Garden".to_string()], false)
        .await
        .expect("terms");
    store
        .set_taxonomy_terms(id, Taxonomy::Feature, &["Garden".to_string(), "Loggia".to_string()], true)
        .await
        .expect("terms");

    let entity = store.entity(id).await.expect("entity");
    assert_eq!(entity.terms[&Taxonomy::Feature], vec!["Garden", "Loggia"]);
}

#[tokio::test]
async fn gallery_replacement_shrinks_and_clears() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), StaticMediaSource::new()).await;
    let owner = store.create_entity(&property("Flat A")).await.expect("create");

    let five: Vec<EntityId> = (100..105).map(EntityId).collect();
    store.replace_gallery_attachments(owner, &five).await.expect("five");
    assert_eq!(store.gallery_attachments(owner).await.expect("gallery"), five);

    store
        .replace_gallery_attachments(owner, &five[..2])
        .await
        .expect("two");
    assert_eq!(store.gallery_attachments(owner).await.expect("gallery"), five[..2].to_vec());
    assert_eq!(
        store
            .get_metadata(owner, MetaKey::GalleryImageCount.as_str())
            .await
            .expect("count"),
        Some(MetaValue::Int(2))
    );
    assert_eq!(
        store
            .get_metadata(owner, MetaKey::GalleryMediaType.as_str())
            .await
            .expect("flag"),
        Some(MetaValue::from("image"))
    );

    store.replace_gallery_attachments(owner, &[]).await.expect("none");
    assert!(store.gallery_attachments(owner).await.expect("gallery").is_empty());
    assert_eq!(
        store
            .get_metadata(owner, MetaKey::GalleryImageCount.as_str())
            .await
            .expect("count"),
        None
    );
    assert_eq!(
        store
            .get_metadata(owner, MetaKey::GalleryMediaType.as_str())
            .await
            .expect("flag"),
        None
    );
}

#[tokio::test]
async fn remote_images_become_attachments_with_thumbnails() {
    let dir = tempdir().expect("tempdir");
    let media = StaticMediaSource::new()
        .with_item("http://x/1.png", png_bytes(400, 300))
        .with_item("http://x/broken.jpg", b"<html>not found</html>".to_vec());
    let store = open_store(dir.path(), media).await;
    let owner = store.create_entity(&property("Flat A")).await.expect("create");

    let attachment = store
        .import_remote_image("http://x/1.png", owner, "Flat A")
        .await
        .expect("import");
    let stored = store.entity(attachment).await.expect("attachment");
    assert_eq!(stored.kind, EntityKind::Attachment);
    assert_eq!(stored.parent, Some(owner));
    assert_eq!(stored.title, "Flat A");

    let path = store
        .attachment_file_path(attachment)
        .await
        .expect("path")
        .expect("has file");
    assert!(path.exists());
    assert!(path.starts_with(dir.path().join("media")));

    let thumbs = store
        .generate_thumbnails(attachment, &path)
        .await
        .expect("thumbnails");
    assert!(thumbs.sizes.contains_key("thumbnail"));
    assert!(store
        .persist_thumbnail_metadata(attachment, &thumbs)
        .await
        .expect("persist"));
    assert!(!store
        .persist_thumbnail_metadata(owner, &thumbs)
        .await
        .expect("persist on property"));

    let invalid = store
        .import_remote_image("http://x/broken.jpg", owner, "")
        .await
        .expect_err("not an image");
    assert!(matches!(invalid, StoreError::InvalidImage { .. }));

    let missing = store
        .import_remote_image("http://x/missing.jpg", owner, "")
        .await
        .expect_err("404");
    assert!(matches!(missing, StoreError::Fetch(_)));
    assert_eq!(store.entity_count(EntityKind::Attachment).await, 1);
}

#[tokio::test]
async fn snapshot_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let id = {
        let store = open_store(dir.path(), StaticMediaSource::new()).await;
        let id = store.create_entity(&property("Flat A")).await.expect("create");
        store
            .set_metadata(id, MetaKey::JsonId.as_str(), MetaValue::Int(7))
            .await
            .expect("meta");
        store
            .set_taxonomy_terms(id, Taxonomy::City, &["Wrocław".to_string()], false)
            .await
            .expect("terms");
        store.flush().await.expect("flush");
        id
    };

    let reopened = open_store(dir.path(), StaticMediaSource::new()).await;
    let entity = reopened.entity(id).await.expect("entity");
    assert_eq!(entity.title, "Flat A");
    assert_eq!(entity.terms[&Taxonomy::City], vec!["Wrocław"]);
    let next = reopened.create_entity(&property("Flat B")).await.expect("create");
    assert!(next > id);
}

#[tokio::test]
async fn blank_titles_are_rejected_by_the_store() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path(), StaticMediaSource::new()).await;
    let err = store.create_entity(&property("  ")).await.expect_err("blank");
    assert!(matches!(err, StoreError::Rejected(_)));
}

use std::path::{Path, PathBuf};

use propsync_core::{AttachmentId, EntityId, EntityKind, ImageRefs, MetaKey, MetaValue};
use propsync_storage::{ContentStore, EntityQuery, StoreError};
use tracing::{debug, info, warn};

pub const DEFAULT_THUMBNAIL_TITLE: &str = "Default Property Thumbnail";

pub fn gallery_alt_text(title: &str, position: usize) -> String {
    format!("{title} - Gallery Image {position}").trim().to_string()
}

/// Turns image URLs into cached attachments, the featured image and the gallery.
pub struct ImageReconciler<'a> {
    store: &'a dyn ContentStore,
    default_thumbnail: Option<PathBuf>,
}

impl<'a> ImageReconciler<'a> {
    pub fn new(store: &'a dyn ContentStore) -> Self {
        Self {
            store,
            default_thumbnail: None,
        }
    }

    pub fn with_default_thumbnail(mut self, path: Option<PathBuf>) -> Self {
        self.default_thumbnail = path;
        self
    }

    pub async fn find_by_source_url(&self, url: &str) -> Result<Option<AttachmentId>, StoreError> {
        let query = EntityQuery::meta_equals(EntityKind::Attachment, MetaKey::SideloadedSourceUrl, url).limit(1);
        Ok(self.store.find_entities(&query).await?.into_iter().next())
    }

    /// Reuses the attachment already imported from `url`, or imports it. Failures are
    /// logged and reported as `None`.
    pub async fn resolve_or_create_attachment(
        &self,
        url: &str,
        owner: EntityId,
        alt_text: &str,
    ) -> Option<AttachmentId> {
        match self.find_by_source_url(url).await {
            Ok(Some(existing)) => {
                debug!(%url, attachment_id = %existing, "attachment cache hit");
                return Some(existing);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(%url, error = %err, "attachment lookup failed");
                return None;
            }
        }

        match self.store.import_remote_image(url, owner, alt_text).await {
            Ok(id) => self.finish_import(id, url, alt_text).await,
            Err(err) => {
                warn!(%url, entity_id = %owner, error = %err, "image import failed");
                None
            }
        }
    }

    async fn finish_import(&self, id: AttachmentId, source_key: &str, alt_text: &str) -> Option<AttachmentId> {
        if let Err(err) = self
            .store
            .set_metadata(id, MetaKey::SideloadedSourceUrl.as_str(), MetaValue::from(source_key))
            .await
        {
            warn!(attachment_id = %id, error = %err, "tagging attachment source failed");
            // An untagged attachment would never be found again.
            if let Err(err) = self.store.trash_entity(id).await {
                warn!(attachment_id = %id, error = %err, "trashing untagged attachment failed");
            }
            return None;
        }

        if !alt_text.trim().is_empty() {
            if let Err(err) = self
                .store
                .add_metadata(id, MetaKey::AttachmentAlt.as_str(), MetaValue::from(alt_text), true)
                .await
            {
                warn!(attachment_id = %id, error = %err, "setting alt text failed");
            }
        }

        self.regenerate_thumbnails(id).await;
        info!(attachment_id = %id, source = source_key, "imported attachment");
        Some(id)
    }

    async fn regenerate_thumbnails(&self, id: AttachmentId) {
        let path = match self.store.attachment_file_path(id).await {
            Ok(Some(path)) => path,
            Ok(None) => return,
            Err(err) => {
                warn!(attachment_id = %id, error = %err, "attachment file lookup failed");
                return;
            }
        };
        let metadata = match self.store.generate_thumbnails(id, &path).await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(attachment_id = %id, error = %err, "thumbnail generation failed");
                return;
            }
        };
        match self.store.persist_thumbnail_metadata(id, &metadata).await {
            Ok(true) => {}
            Ok(false) => debug!(attachment_id = %id, "thumbnail metadata unchanged"),
            Err(err) => warn!(attachment_id = %id, error = %err, "saving thumbnail metadata failed"),
        }
    }

    async fn default_thumbnail_attachment(&self, owner: EntityId, alt_text: &str) -> Option<AttachmentId> {
        let path = self.default_thumbnail.as_deref()?;
        if !path.exists() {
            warn!(path = %path.display(), "default thumbnail not found");
            return None;
        }
        let source_key = default_thumbnail_key(path);

        match self.find_by_source_url(&source_key).await {
            Ok(Some(existing)) => return Some(existing),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "default thumbnail lookup failed");
                return None;
            }
        }

        let title = if alt_text.trim().is_empty() {
            DEFAULT_THUMBNAIL_TITLE
        } else {
            alt_text
        };
        match self.store.import_local_image(path, owner, title).await {
            Ok(id) => self.finish_import(id, &source_key, alt_text).await,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "importing default thumbnail failed");
                None
            }
        }
    }

    /// Points the featured image at `url`, falling back to the placeholder when the
    /// import fails. Returns the attachment now featured, if any.
    pub async fn sync_featured_image(
        &self,
        entity: EntityId,
        url: &str,
        alt_text: &str,
    ) -> Option<AttachmentId> {
        if url.trim().is_empty() {
            return None;
        }
        let attachment = match self.resolve_or_create_attachment(url, entity, alt_text).await {
            Some(id) => id,
            None => {
                warn!(entity_id = %entity, %url, "featured image failed, trying default thumbnail");
                self.default_thumbnail_attachment(entity, alt_text).await?
            }
        };

        match self.store.featured_image(entity).await {
            Ok(Some(current)) if current == attachment => return Some(attachment),
            Ok(_) => {}
            Err(err) => warn!(entity_id = %entity, error = %err, "reading featured image failed"),
        }
        if let Err(err) = self.store.set_featured_image(entity, attachment).await {
            warn!(entity_id = %entity, error = %err, "setting featured image failed");
            return None;
        }
        Some(attachment)
    }

    /// Resolves every gallery URL and rewrites gallery membership from scratch.
    pub async fn sync_gallery(
        &self,
        entity: EntityId,
        urls: &[String],
        title: &str,
    ) -> Result<Vec<AttachmentId>, StoreError> {
        let mut attachments: Vec<AttachmentId> = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            if url.trim().is_empty() {
                debug!(entity_id = %entity, index, "skipping empty gallery url");
                continue;
            }
            let alt = gallery_alt_text(title, index + 1);
            if let Some(id) = self.resolve_or_create_attachment(url, entity, &alt).await {
                if !attachments.contains(&id) {
                    attachments.push(id);
                }
            }
        }
        self.store.replace_gallery_attachments(entity, &attachments).await?;
        debug!(entity_id = %entity, count = attachments.len(), "gallery rewritten");
        Ok(attachments)
    }

    /// Featured image then gallery. Only a failed gallery rewrite is reported.
    pub async fn sync_images(
        &self,
        entity: EntityId,
        images: &ImageRefs,
        title: &str,
    ) -> Result<(), StoreError> {
        if let Some(url) = images.featured_image_url.as_deref() {
            self.sync_featured_image(entity, url, title).await;
        }
        self.sync_gallery(entity, &images.gallery_image_urls, title).await?;
        Ok(())
    }
}

pub fn default_thumbnail_key(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

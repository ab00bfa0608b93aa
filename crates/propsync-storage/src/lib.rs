//! Content-store contract, a local file-backed store, and media fetch utilities.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use propsync_core::{AttachmentId, EntityId, EntityKind, MetaKey, MetaValue, PostFields, Taxonomy};
use thiserror::Error;

mod artifact;
mod fetch;
mod local;
mod thumbnail;

pub use artifact::{ArtifactStore, StoredArtifact};
pub use fetch::{
    is_transient_status, is_transient_transport, BackoffPolicy, FetchError, FetchedResponse,
    HttpClientConfig, HttpFetcher, MediaSource, StaticMediaSource,
};
pub use local::{LocalContentStore, MetaEntry, StoredEntity};
pub use thumbnail::{generate_thumbnails, ThumbnailMetadata, ThumbnailSize, ThumbnailVariant, THUMBNAIL_SIZES};

pub const CRATE_NAME: &str = "propsync-storage";

/// Media type flag written next to a non-empty gallery.
pub const GALLERY_MEDIA_TYPE: &str = "image";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity {0} not found")]
    NotFound(EntityId),
    #[error("store rejected the write: {0}")]
    Rejected(String),
    #[error("media fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("{source_ref} is not a supported image")]
    InvalidImage { source_ref: String },
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityFilter {
    /// Some value stored under `key` has the text form `value`.
    MetaEquals { key: String, value: String },
    /// Case-sensitive exact title match.
    TitleEquals(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityQuery {
    pub kind: EntityKind,
    pub filter: EntityFilter,
    pub include_trashed: bool,
    pub limit: Option<usize>,
}

impl EntityQuery {
    pub fn meta_equals(kind: EntityKind, key: MetaKey, value: impl Into<String>) -> Self {
        Self {
            kind,
            filter: EntityFilter::MetaEquals {
                key: key.as_str().to_string(),
                value: value.into(),
            },
            include_trashed: false,
            limit: None,
        }
    }

    pub fn title_equals(kind: EntityKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            filter: EntityFilter::TitleEquals(title.into()),
            include_trashed: false,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Post, metadata, taxonomy and media primitives the reconcilers are written against.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find_entities(&self, query: &EntityQuery) -> Result<Vec<EntityId>, StoreError>;

    async fn create_entity(&self, fields: &PostFields) -> Result<EntityId, StoreError>;

    async fn update_entity(&self, id: EntityId, fields: &PostFields) -> Result<(), StoreError>;

    /// Move an entity to the trash; lookups skip it from then on.
    async fn trash_entity(&self, id: EntityId) -> Result<(), StoreError>;

    /// First value stored under `key`.
    async fn get_metadata(&self, id: EntityId, key: &str) -> Result<Option<MetaValue>, StoreError>;

    async fn get_metadata_values(&self, id: EntityId, key: &str) -> Result<Vec<MetaValue>, StoreError>;

    /// Overwrite every value under `key` with a single value.
    async fn set_metadata(&self, id: EntityId, key: &str, value: MetaValue) -> Result<(), StoreError>;

    /// Append a value. With `unique`, nothing is written if the key already exists.
    async fn add_metadata(
        &self,
        id: EntityId,
        key: &str,
        value: MetaValue,
        unique: bool,
    ) -> Result<bool, StoreError>;

    /// Remove every value under `key`, returning how many were removed.
    async fn delete_metadata(&self, id: EntityId, key: &str) -> Result<usize, StoreError>;

    async fn set_taxonomy_terms(
        &self,
        id: EntityId,
        taxonomy: Taxonomy,
        terms: &[String],
        append: bool,
    ) -> Result<(), StoreError>;

    async fn import_remote_image(
        &self,
        url: &str,
        owner: EntityId,
        alt_text: &str,
    ) -> Result<AttachmentId, StoreError>;

    async fn import_local_image(
        &self,
        path: &Path,
        owner: EntityId,
        alt_text: &str,
    ) -> Result<AttachmentId, StoreError>;

    async fn attachment_file_path(&self, id: AttachmentId) -> Result<Option<PathBuf>, StoreError>;

    async fn generate_thumbnails(
        &self,
        id: AttachmentId,
        path: &Path,
    ) -> Result<ThumbnailMetadata, StoreError>;

    async fn persist_thumbnail_metadata(
        &self,
        id: AttachmentId,
        metadata: &ThumbnailMetadata,
    ) -> Result<bool, StoreError>;

    async fn set_featured_image(&self, entity: EntityId, attachment: AttachmentId) -> Result<(), StoreError>;

    async fn featured_image(&self, entity: EntityId) -> Result<Option<AttachmentId>, StoreError>;

    /// Replace gallery membership of `entity` with exactly `attachments`, in order.
    ///
    /// Existing entries are always cleared first. A non-empty list is written as
    /// one repeated entry per attachment plus a count and a media-type flag; an
    /// empty list removes the count and flag as well.
    async fn replace_gallery_attachments(
        &self,
        entity: EntityId,
        attachments: &[AttachmentId],
    ) -> Result<(), StoreError> {
        self.delete_metadata(entity, MetaKey::GalleryImages.as_str()).await?;

        if attachments.is_empty() {
            self.delete_metadata(entity, MetaKey::GalleryImageCount.as_str())
                .await?;
            self.delete_metadata(entity, MetaKey::GalleryMediaType.as_str())
                .await?;
            return Ok(());
        }

        for attachment in attachments {
            self.add_metadata(
                entity,
                MetaKey::GalleryImages.as_str(),
                MetaValue::Int(attachment.0 as i64),
                false,
            )
            .await?;
        }
        self.set_metadata(
            entity,
            MetaKey::GalleryImageCount.as_str(),
            MetaValue::Int(attachments.len() as i64),
        )
        .await?;
        self.set_metadata(
            entity,
            MetaKey::GalleryMediaType.as_str(),
            MetaValue::from(GALLERY_MEDIA_TYPE),
        )
        .await?;
        Ok(())
    }

    async fn gallery_attachments(&self, entity: EntityId) -> Result<Vec<AttachmentId>, StoreError> {
        let values = self
            .get_metadata_values(entity, MetaKey::GalleryImages.as_str())
            .await?;
        Ok(values
            .iter()
            .filter_map(MetaValue::as_int)
            .filter(|id| *id > 0)
            .map(|id| EntityId(id as u64))
            .collect())
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use propsync_core::{
    AttachmentId, EntityId, EntityKind, MetaValue, PostDate, PostFields, PostStatus, Taxonomy,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::artifact::{write_atomic, ArtifactStore};
use crate::fetch::MediaSource;
use crate::thumbnail::{self, ThumbnailMetadata};
use crate::{ContentStore, EntityFilter, EntityQuery, StoreError};

const SNAPSHOT_FILE: &str = "store.json";
const MEDIA_DIR: &str = "media";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: MetaValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub status: PostStatus,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub created: Option<PostDate>,
    #[serde(default)]
    pub modified: Option<PostDate>,
    #[serde(default)]
    pub parent: Option<EntityId>,
    #[serde(default)]
    pub metadata: Vec<MetaEntry>,
    #[serde(default)]
    pub terms: BTreeMap<Taxonomy, Vec<String>>,
    #[serde(default)]
    pub featured_image: Option<AttachmentId>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub thumbnails: Option<ThumbnailMetadata>,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredEntity {
    pub fn meta_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a MetaValue> + 'a {
        self.metadata
            .iter()
            .filter(move |entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    fn matches(&self, query: &EntityQuery) -> bool {
        if self.kind != query.kind {
            return false;
        }
        if self.status == PostStatus::Trash && !query.include_trashed {
            return false;
        }
        match &query.filter {
            EntityFilter::MetaEquals { key, value } => {
                self.meta_values(key).any(|v| v.text_form() == *value)
            }
            EntityFilter::TitleEquals(title) => self.title == *title,
        }
    }

    fn apply_fields(&mut self, fields: &PostFields) {
        self.title = fields.title.clone();
        self.content = fields.content.clone();
        self.status = fields.status;
        if fields.created.is_some() {
            self.created = fields.created;
        }
        if fields.modified.is_some() {
            self.modified = fields.modified;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    next_id: u64,
    entities: BTreeMap<EntityId, StoredEntity>,
}

impl StoreState {
    fn allocate(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut StoredEntity, StoreError> {
        self.entities.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    fn entity(&self, id: EntityId) -> Result<&StoredEntity, StoreError> {
        self.entities.get(&id).ok_or(StoreError::NotFound(id))
    }
}

/// File-backed [`ContentStore`]: entity state lives in memory and is written to
/// `<root>/store.json` by [`LocalContentStore::flush`]; media lands under `<root>/media`.
pub struct LocalContentStore {
    root: PathBuf,
    media: ArtifactStore,
    source: Arc<dyn MediaSource>,
    state: Mutex<StoreState>,
}

impl LocalContentStore {
    pub async fn open(root: impl Into<PathBuf>, source: Arc<dyn MediaSource>) -> anyhow::Result<Self> {
        let root = root.into();
        let snapshot = root.join(SNAPSHOT_FILE);
        let state = if tokio::fs::try_exists(&snapshot)
            .await
            .with_context(|| format!("checking {}", snapshot.display()))?
        {
            let text = tokio::fs::read_to_string(&snapshot)
                .await
                .with_context(|| format!("reading {}", snapshot.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", snapshot.display()))?
        } else {
            StoreState::default()
        };
        info!(root = %root.display(), entities = state.entities.len(), "opened local content store");

        Ok(Self {
            media: ArtifactStore::new(root.join(MEDIA_DIR)),
            root,
            source,
            state: Mutex::new(state),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    pub async fn flush(&self) -> anyhow::Result<()> {
        let bytes = {
            let state = self.state.lock().await;
            serde_json::to_vec_pretty(&*state).context("serializing store snapshot")?
        };
        let path = self.snapshot_path();
        write_atomic(&path, &bytes).await?;
        debug!(path = %path.display(), "flushed store snapshot");
        Ok(())
    }

    pub async fn entity(&self, id: EntityId) -> Option<StoredEntity> {
        self.state.lock().await.entities.get(&id).cloned()
    }

    pub async fn entity_count(&self, kind: EntityKind) -> usize {
        self.state
            .lock()
            .await
            .entities
            .values()
            .filter(|e| e.kind == kind)
            .count()
    }

    async fn persist_media(
        &self,
        bytes: &[u8],
        source_ref: &str,
        owner: EntityId,
        alt_text: &str,
    ) -> Result<AttachmentId, StoreError> {
        let format = image::guess_format(bytes).map_err(|_| StoreError::InvalidImage {
            source_ref: source_ref.to_string(),
        })?;
        let extension = format.extensions_str().first().copied().unwrap_or("bin");

        {
            let state = self.state.lock().await;
            state.entity(owner)?;
        }

        let stored = self.media.store_bytes(extension, bytes).await?;
        let title = if alt_text.trim().is_empty() {
            media_label(source_ref)
        } else {
            alt_text.trim().to_string()
        };

        let mut state = self.state.lock().await;
        let id = state.allocate();
        let now = Utc::now();
        state.entities.insert(
            id,
            StoredEntity {
                id,
                kind: EntityKind::Attachment,
                status: PostStatus::Inherit,
                title,
                content: String::new(),
                created: None,
                modified: None,
                parent: Some(owner),
                metadata: Vec::new(),
                terms: BTreeMap::new(),
                featured_image: None,
                file: Some(stored.absolute_path.clone()),
                thumbnails: None,
                inserted_at: now,
                updated_at: now,
            },
        );
        debug!(
            attachment_id = %id,
            %owner,
            source_ref,
            bytes = stored.byte_size,
            deduplicated = stored.deduplicated,
            "stored attachment"
        );
        Ok(id)
    }
}

fn media_label(source_ref: &str) -> String {
    if let Ok(parsed) = url::Url::parse(source_ref) {
        if let Some(last) = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        {
            return last.to_string();
        }
    }
    Path::new(source_ref)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source_ref)
        .to_string()
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn find_entities(&self, query: &EntityQuery) -> Result<Vec<EntityId>, StoreError> {
        let state = self.state.lock().await;
        let matches = state
            .entities
            .values()
            .filter(|entity| entity.matches(query))
            .map(|entity| entity.id);
        Ok(match query.limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        })
    }

    async fn create_entity(&self, fields: &PostFields) -> Result<EntityId, StoreError> {
        if fields.title.trim().is_empty() {
            return Err(StoreError::Rejected("entity title is empty".to_string()));
        }
        let mut state = self.state.lock().await;
        let id = state.allocate();
        let now = Utc::now();
        state.entities.insert(
            id,
            StoredEntity {
                id,
                kind: fields.post_type,
                status: fields.status,
                title: fields.title.clone(),
                content: fields.content.clone(),
                created: fields.created,
                modified: fields.modified,
                parent: None,
                metadata: Vec::new(),
                terms: BTreeMap::new(),
                featured_image: None,
                file: None,
                thumbnails: None,
                inserted_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn trash_entity(&self, id: EntityId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entity = state.entity_mut(id)?;
        entity.status = PostStatus::Trash;
        entity.updated_at = Utc::now();
        Ok(())
    }

    async fn update_entity(&self, id: EntityId, fields: &PostFields) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.entity_mut(id)?.apply_fields(fields);
        Ok(())
    }

    async fn get_metadata(&self, id: EntityId, key: &str) -> Result<Option<MetaValue>, StoreError> {
        let state = self.state.lock().await;
        let value = state.entity(id)?.meta_values(key).next().cloned();
        Ok(value)
    }

    async fn get_metadata_values(&self, id: EntityId, key: &str) -> Result<Vec<MetaValue>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.entity(id)?.meta_values(key).cloned().collect())
    }

    async fn set_metadata(&self, id: EntityId, key: &str, value: MetaValue) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entity = state.entity_mut(id)?;
        match entity.metadata.iter().position(|entry| entry.key == key) {
            Some(first) => {
                entity.metadata[first].value = value;
                let mut index = 0usize;
                entity.metadata.retain(|entry| {
                    let keep = entry.key != key || index == first;
                    index += 1;
                    keep
                });
            }
            None => entity.metadata.push(MetaEntry {
                key: key.to_string(),
                value,
            }),
        }
        Ok(())
    }

    async fn add_metadata(
        &self,
        id: EntityId,
        key: &str,
        value: MetaValue,
        unique: bool,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let entity = state.entity_mut(id)?;
        if unique && entity.metadata.iter().any(|entry| entry.key == key) {
            return Ok(false);
        }
        entity.metadata.push(MetaEntry {
            key: key.to_string(),
            value,
        });
        Ok(true)
    }

    async fn delete_metadata(&self, id: EntityId, key: &str) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let entity = state.entity_mut(id)?;
        let before = entity.metadata.len();
        entity.metadata.retain(|entry| entry.key != key);
        Ok(before - entity.metadata.len())
    }

    async fn set_taxonomy_terms(
        &self,
        id: EntityId,
        taxonomy: Taxonomy,
        terms: &[String],
        append: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entity = state.entity_mut(id)?;
        let mut merged = if append {
            entity.terms.get(&taxonomy).cloned().unwrap_or_default()
        } else {
            Vec::new()
        };
        for term in terms {
            let term = term.trim();
            if !term.is_empty() && !merged.iter().any(|t| t == term) {
                merged.push(term.to_string());
            }
        }
        if merged.is_empty() {
            entity.terms.remove(&taxonomy);
        } else {
            entity.terms.insert(taxonomy, merged);
        }
        Ok(())
    }

    async fn import_remote_image(
        &self,
        url: &str,
        owner: EntityId,
        alt_text: &str,
    ) -> Result<AttachmentId, StoreError> {
        let fetched = self.source.fetch_media(url).await?;
        self.persist_media(&fetched.body, url, owner, alt_text).await
    }

    async fn import_local_image(
        &self,
        path: &Path,
        owner: EntityId,
        alt_text: &str,
    ) -> Result<AttachmentId, StoreError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| StoreError::Io {
            context: format!("reading {}", path.display()),
            source,
        })?;
        self.persist_media(&bytes, &path.display().to_string(), owner, alt_text)
            .await
    }

    async fn attachment_file_path(&self, id: AttachmentId) -> Result<Option<PathBuf>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.entity(id)?.file.clone())
    }

    async fn generate_thumbnails(
        &self,
        id: AttachmentId,
        path: &Path,
    ) -> Result<ThumbnailMetadata, StoreError> {
        {
            let state = self.state.lock().await;
            state.entity(id)?;
        }
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || thumbnail::generate_thumbnails(&path))
            .await
            .map_err(|err| StoreError::Rejected(format!("thumbnail task failed: {err}")))?
    }

    async fn persist_thumbnail_metadata(
        &self,
        id: AttachmentId,
        metadata: &ThumbnailMetadata,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.entities.get_mut(&id) {
            Some(entity) if entity.kind == EntityKind::Attachment => {
                entity.thumbnails = Some(metadata.clone());
                entity.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_featured_image(&self, entity: EntityId, attachment: AttachmentId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.entity(attachment)?;
        let target = state.entity_mut(entity)?;
        target.featured_image = Some(attachment);
        target.updated_at = Utc::now();
        Ok(())
    }

    async fn featured_image(&self, entity: EntityId) -> Result<Option<AttachmentId>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.entity(entity)?.featured_image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_labels_come_from_the_last_path_segment() {
        assert_eq!(media_label("http://x/photos/1.jpg"), "1.jpg");
        assert_eq!(media_label("http://x/photos/"), "photos");
        assert_eq!(media_label("/srv/data/default-thumbnail.webp"), "default-thumbnail.webp");
    }
}

use propsync_core::{EntityId, EntityKind, MetaKey, NormalizedRecord};
use propsync_mapping::mappers::IdentifierMapper;
use propsync_storage::{ContentStore, EntityQuery, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Item data is missing a unique ID.")]
    MissingSourceId,
    #[error("looking up existing property failed: {0}")]
    Lookup(#[source] StoreError),
    #[error("inserting new property failed: {0}")]
    Insert(#[source] StoreError),
    #[error("updating property {id} failed: {source}")]
    Update {
        id: EntityId,
        #[source]
        source: StoreError,
    },
    #[error("writing `{key}` on property {id} failed: {source}")]
    Write {
        id: EntityId,
        key: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created(EntityId),
    Updated(EntityId),
    /// The mapped title was empty; nothing was written.
    Skipped,
}

impl ReconcileOutcome {
    pub fn entity_id(self) -> Option<EntityId> {
        match self {
            Self::Created(id) | Self::Updated(id) => Some(id),
            Self::Skipped => None,
        }
    }
}

/// Upserts one normalized record onto the property entity sharing its `jsonId`.
pub struct PostReconciler<'a> {
    store: &'a dyn ContentStore,
}

impl<'a> PostReconciler<'a> {
    pub fn new(store: &'a dyn ContentStore) -> Self {
        Self { store }
    }

    pub async fn find_existing(&self, source_id: &str) -> Result<Option<EntityId>, StoreError> {
        let stored_form = IdentifierMapper::json_id_value(source_id).text_form();
        let query = EntityQuery::meta_equals(EntityKind::Property, MetaKey::JsonId, stored_form).limit(1);
        Ok(self.store.find_entities(&query).await?.into_iter().next())
    }

    pub async fn reconcile(
        &self,
        source_id: &str,
        record: &NormalizedRecord,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let source_id = source_id.trim();
        if source_id.is_empty() {
            return Err(ReconcileError::MissingSourceId);
        }
        if record.post.title.trim().is_empty() {
            debug!(json_id = source_id, "empty title after mapping, skipping");
            return Ok(ReconcileOutcome::Skipped);
        }

        let outcome = match self
            .find_existing(source_id)
            .await
            .map_err(ReconcileError::Lookup)?
        {
            Some(id) => {
                self.store
                    .update_entity(id, &record.post)
                    .await
                    .map_err(|source| ReconcileError::Update { id, source })?;
                info!(json_id = source_id, entity_id = %id, "updated property");
                ReconcileOutcome::Updated(id)
            }
            None => {
                let id = self
                    .store
                    .create_entity(&record.post)
                    .await
                    .map_err(ReconcileError::Insert)?;
                info!(json_id = source_id, entity_id = %id, "created property");
                ReconcileOutcome::Created(id)
            }
        };

        if let Some(id) = outcome.entity_id() {
            self.write_metadata(id, record).await;
            self.write_taxonomies(id, record).await?;
        }
        Ok(outcome)
    }

    /// Individual metadata failures are logged and the remaining keys still written.
    async fn write_metadata(&self, id: EntityId, record: &NormalizedRecord) {
        for (key, value) in &record.metadata {
            // Gallery membership belongs to the image reconciler.
            if *key == MetaKey::GalleryImages {
                continue;
            }
            if let Err(err) = self.store.set_metadata(id, key.as_str(), value.clone()).await {
                warn!(entity_id = %id, key = key.as_str(), error = %err, "metadata write failed");
            }
        }
    }

    async fn write_taxonomies(&self, id: EntityId, record: &NormalizedRecord) -> Result<(), ReconcileError> {
        for (taxonomy, terms) in &record.taxonomy_terms {
            self.store
                .set_taxonomy_terms(id, *taxonomy, terms, false)
                .await
                .map_err(|source| ReconcileError::Write {
                    id,
                    key: taxonomy.as_str().to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}

use propsync_core::{EntityKind, RawRecord};
use propsync_storage::{ContentStore, EntityQuery, StoreError};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateFilterStats {
    pub original_count: usize,
    pub after_filter_count: usize,
    pub filtered_out_count: usize,
    pub without_title_count: usize,
}

/// Title-based pre-pass that drops records whose `portalTitle` already names a
/// stored property. Identity is still decided later by `jsonId`, so a failed
/// lookup keeps the record.
pub struct DuplicateFilter<'a> {
    store: &'a dyn ContentStore,
}

impl<'a> DuplicateFilter<'a> {
    pub fn new(store: &'a dyn ContentStore) -> Self {
        Self { store }
    }

    async fn title_exists(&self, title: &str) -> Result<bool, StoreError> {
        let query = EntityQuery::title_equals(EntityKind::Property, title).limit(1);
        Ok(!self.store.find_entities(&query).await?.is_empty())
    }

    pub async fn filter(&self, records: Vec<Option<RawRecord>>) -> (Vec<Option<RawRecord>>, DuplicateFilterStats) {
        let mut stats = DuplicateFilterStats {
            original_count: records.len(),
            ..DuplicateFilterStats::default()
        };
        let mut kept = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let title = record
                .as_ref()
                .and_then(RawRecord::portal_title)
                .map(str::to_string);
            let Some(title) = title else {
                debug!(index, "record has no portalTitle, keeping it");
                stats.without_title_count += 1;
                kept.push(record);
                continue;
            };

            match self.title_exists(&title).await {
                Ok(true) => {
                    debug!(index, title = %title, "title already stored, dropping record");
                    stats.filtered_out_count += 1;
                }
                Ok(false) => kept.push(record),
                Err(err) => {
                    warn!(index, title = %title, error = %err, "title lookup failed, keeping record");
                    kept.push(record);
                }
            }
        }

        stats.after_filter_count = kept.len();
        info!(
            original = stats.original_count,
            kept = stats.after_filter_count,
            dropped = stats.filtered_out_count,
            without_title = stats.without_title_count,
            "duplicate filter finished"
        );
        (kept, stats)
    }
}

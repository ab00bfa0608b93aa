use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use propsync_core::{json_scalar_text, DictionaryTable, RawRecord, SyncOutcome};
use propsync_mapping::PropertyMapper;
use propsync_storage::ContentStore;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::DEFAULT_MESSAGE_LIMIT;
use crate::duplicates::{DuplicateFilter, DuplicateFilterStats};
use crate::images::ImageReconciler;
use crate::reconcile::{PostReconciler, ReconcileError, ReconcileOutcome};

pub const UNKNOWN_ITEM_ID: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Start index must be less than or equal to end index (got {start} > {end}).")]
    InvalidRange { start: usize, end: usize },
}

/// Which slice of the feed a run processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncSelection {
    /// The first `limit` items; `0` means all of them.
    Count { limit: usize },
    /// Items `start..=end` by position.
    Range { start: usize, end: usize },
}

impl Default for SyncSelection {
    fn default() -> Self {
        Self::Count { limit: 0 }
    }
}

impl SyncSelection {
    pub fn count(limit: Option<usize>) -> Self {
        Self::Count {
            limit: limit.unwrap_or(0),
        }
    }

    pub fn range(start: usize, end: usize) -> Result<Self, SelectionError> {
        if start > end {
            return Err(SelectionError::InvalidRange { start, end });
        }
        Ok(Self::Range { start, end })
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Count { .. } => "count",
            Self::Range { .. } => "range",
        }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        match *self {
            Self::Count { limit: 0 } => items,
            Self::Count { limit } => items.into_iter().take(limit).collect(),
            Self::Range { start, end } => items
                .into_iter()
                .skip(start)
                .take((end - start).saturating_add(1))
                .collect(),
        }
    }
}

impl fmt::Display for SyncSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count { limit: 0 } => f.write_str("all items"),
            Self::Count { limit } => write!(f, "first {limit} items"),
            Self::Range { start, end } => write!(f, "items {start} to {end}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub index: usize,
    pub item_id: String,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub selection: SyncSelection,
    pub skip_duplicates: bool,
    pub success: usize,
    pub skipped: usize,
    pub error: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_filter: Option<DuplicateFilterStats>,
    pub outcomes: Vec<ItemOutcome>,
    pub messages: Vec<String>,
    #[serde(skip)]
    message_limit: usize,
    #[serde(skip)]
    omitted_messages: usize,
}

impl SyncReport {
    pub fn new(selection: SyncSelection, skip_duplicates: bool, message_limit: usize) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            selection,
            skip_duplicates,
            success: 0,
            skipped: 0,
            error: 0,
            duplicate_filter: None,
            outcomes: Vec::new(),
            messages: Vec::new(),
            message_limit,
            omitted_messages: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.skipped + self.error
    }

    pub fn push_message(&mut self, message: impl Into<String>) {
        if self.messages.len() < self.message_limit {
            self.messages.push(message.into());
        } else {
            self.omitted_messages += 1;
        }
    }

    pub fn record(&mut self, index: usize, item_id: &str, outcome: SyncOutcome) {
        let message = match &outcome {
            SyncOutcome::Success(entity) => {
                self.success += 1;
                format!("Successfully synced item ID {item_id} to post ID {entity}.")
            }
            SyncOutcome::Skipped => {
                self.skipped += 1;
                format!("Item ID {item_id} skipped during sync processing.")
            }
            SyncOutcome::Error(reason) => {
                self.error += 1;
                format!("Error syncing item ID {item_id}: {reason}")
            }
        };
        self.push_message(message);
        self.outcomes.push(ItemOutcome {
            index,
            item_id: item_id.to_string(),
            outcome,
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
        if self.omitted_messages > 0 {
            self.messages
                .push(format!("{} further messages omitted", self.omitted_messages));
            self.omitted_messages = 0;
        }
    }
}

/// Processes records one at a time and classifies each into exactly one outcome.
pub struct BatchDriver<'a> {
    store: &'a dyn ContentStore,
    mapper: &'a PropertyMapper,
    dictionary: &'a DictionaryTable,
    default_thumbnail: Option<PathBuf>,
    feed_path: Option<PathBuf>,
    message_limit: usize,
}

impl<'a> BatchDriver<'a> {
    pub fn new(store: &'a dyn ContentStore, mapper: &'a PropertyMapper, dictionary: &'a DictionaryTable) -> Self {
        Self {
            store,
            mapper,
            dictionary,
            default_thumbnail: None,
            feed_path: None,
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }

    pub fn with_default_thumbnail(mut self, path: Option<PathBuf>) -> Self {
        self.default_thumbnail = path;
        self
    }

    /// Only used to explain an empty feed in the report.
    pub fn with_feed_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.feed_path = Some(path.into());
        self
    }

    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.message_limit = limit;
        self
    }

    pub async fn run(
        &self,
        records: Vec<Option<RawRecord>>,
        selection: SyncSelection,
        skip_duplicates: bool,
    ) -> SyncReport {
        let mut report = SyncReport::new(selection, skip_duplicates, self.message_limit);
        let mut records = selection.apply(records);

        if skip_duplicates {
            let (kept, stats) = DuplicateFilter::new(self.store).filter(records).await;
            records = kept;
            report.duplicate_filter = Some(stats);
        }

        self.header_messages(&mut report, records.len());
        if records.is_empty() {
            self.empty_feed_messages(&mut report);
            report.finish();
            return report;
        }

        for (index, record) in records.iter().enumerate() {
            let item_id = record
                .as_ref()
                .and_then(|raw| raw.get("id"))
                .and_then(json_scalar_text)
                .unwrap_or_else(|| UNKNOWN_ITEM_ID.to_string());
            let outcome = self
                .sync_record(record.as_ref())
                .instrument(info_span!("sync_record", index, json_id = %item_id))
                .await;
            report.record(index, &item_id, outcome);
        }

        report.finish();
        info!(
            run_id = %report.run_id,
            success = report.success,
            skipped = report.skipped,
            error = report.error,
            "sync run finished"
        );
        report
    }

    fn header_messages(&self, report: &mut SyncReport, count: usize) {
        report.push_message(format!("Debug: Received {count} data items for processing."));
        report.push_message(format!("Debug: Sync mode: {}", report.selection.mode()));
        match report.selection {
            SyncSelection::Range { start, end } => {
                report.push_message(format!("Debug: Range requested: {start} to {end}"))
            }
            SyncSelection::Count { limit } => {
                report.push_message(format!("Debug: Items to process: {limit}"))
            }
        }
        let skip = if report.skip_duplicates { "Yes" } else { "No" };
        report.push_message(format!("Debug: Skip duplicates: {skip}"));

        if let Some(stats) = report.duplicate_filter {
            report.push_message(format!(
                "Duplicate Filter: {} items retrieved, {} after filtering, {} filtered out as duplicates",
                stats.original_count, stats.after_filter_count, stats.filtered_out_count
            ));
            if stats.filtered_out_count > 0 {
                report.push_message(format!(
                    "Note: {} duplicate items were removed before processing (based on portalTitle)",
                    stats.filtered_out_count
                ));
            }
        }
    }

    fn empty_feed_messages(&self, report: &mut SyncReport) {
        report.push_message("No data items found to process or error reading data source.");
        if let Some(path) = &self.feed_path {
            let exists = path.exists();
            report.push_message(format!(
                "Debug: JSON file exists: {}",
                if exists { "Yes" } else { "No" }
            ));
            if exists {
                report.push_message(format!("Debug: JSON file path: {}", path.display()));
            }
        }
    }

    pub async fn sync_record(&self, record: Option<&RawRecord>) -> SyncOutcome {
        let Some(raw) = record.filter(|raw| raw.is_set("id")) else {
            return SyncOutcome::Error("Invalid item structure".to_string());
        };
        let Some(source_id) = raw.source_id() else {
            return SyncOutcome::Error(ReconcileError::MissingSourceId.to_string());
        };

        let normalized = self.mapper.map(raw, self.dictionary);
        let reconciler = PostReconciler::new(self.store);
        let entity = match reconciler.reconcile(&source_id, &normalized).await {
            Ok(ReconcileOutcome::Skipped) => return SyncOutcome::Skipped,
            Ok(ReconcileOutcome::Created(id)) | Ok(ReconcileOutcome::Updated(id)) => id,
            Err(err) => {
                warn!(json_id = %source_id, error = %err, "record failed");
                return SyncOutcome::Error(err.to_string());
            }
        };

        let images = ImageReconciler::new(self.store).with_default_thumbnail(self.default_thumbnail.clone());
        if let Err(err) = images
            .sync_images(entity, &normalized.images, &normalized.post.title)
            .await
        {
            warn!(json_id = %source_id, entity_id = %entity, error = %err, "gallery update failed");
        }
        SyncOutcome::Success(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_inclusive_and_validated() {
        let items: Vec<usize> = (0..10).collect();
        assert_eq!(SyncSelection::range(2, 4).expect("range").apply(items.clone()), [2, 3, 4]);
        assert_eq!(SyncSelection::range(8, 20).expect("range").apply(items.clone()), [8, 9]);
        assert!(SyncSelection::range(12, 20).expect("range").apply(items.clone()).is_empty());
        assert_eq!(
            SyncSelection::range(0, usize::MAX).expect("range").apply(items.clone()).len(),
            10
        );
        assert_eq!(
            SyncSelection::range(5, 1),
            Err(SelectionError::InvalidRange { start: 5, end: 1 })
        );
    }

    #[test]
    fn zero_count_selects_everything() {
        let items: Vec<usize> = (0..5).collect();
        assert_eq!(SyncSelection::count(None).apply(items.clone()).len(), 5);
        assert_eq!(SyncSelection::count(Some(0)).apply(items.clone()).len(), 5);
        assert_eq!(SyncSelection::count(Some(2)).apply(items), [0, 1]);
    }

    #[test]
    fn messages_are_bounded_with_an_omission_line() {
        let mut report = SyncReport::new(SyncSelection::default(), false, 2);
        for index in 0..5 {
            report.record(index, &index.to_string(), SyncOutcome::Skipped);
        }
        report.finish();
        assert_eq!(report.skipped, 5);
        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(
            report.messages,
            [
                "Item ID 0 skipped during sync processing.",
                "Item ID 1 skipped during sync processing.",
                "3 further messages omitted"
            ]
        );
    }
}

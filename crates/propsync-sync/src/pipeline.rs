use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use propsync_core::{DictionaryTable, NormalizedRecord, RawRecord};
use propsync_mapping::{load_dictionary, load_feed, PropertyMapper};
use propsync_storage::{HttpClientConfig, HttpFetcher, LocalContentStore, MediaSource};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::{BatchDriver, SyncReport, SyncSelection};
use crate::config::SyncConfig;
use crate::report::write_report;

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed: usize,
    pub success: usize,
    pub skipped: usize,
    pub error: usize,
    pub reports_dir: String,
}

impl SyncRunSummary {
    fn from_report(report: &SyncReport, reports_dir: String) -> Self {
        Self {
            run_id: report.run_id,
            started_at: report.started_at,
            finished_at: report.finished_at,
            processed: report.total(),
            success: report.success,
            skipped: report.skipped,
            error: report.error,
            reports_dir,
        }
    }
}

pub struct SyncPipeline {
    config: SyncConfig,
    mapper: PropertyMapper,
    dictionary: DictionaryTable,
    store: LocalContentStore,
}

impl SyncPipeline {
    pub async fn new(config: SyncConfig) -> Result<Self> {
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
            ..Default::default()
        })?;
        Self::with_media_source(config, Arc::new(http)).await
    }

    /// Same as [`SyncPipeline::new`] but downloads through `source` instead of HTTP.
    pub async fn with_media_source(config: SyncConfig, source: Arc<dyn MediaSource>) -> Result<Self> {
        let mapper = PropertyMapper::new(config.mapper_config()?);
        let dictionary = load_dictionary(&config.dictionary_path)?;
        let store = LocalContentStore::open(config.store_dir.clone(), source)
            .await
            .with_context(|| format!("opening store at {}", config.store_dir.display()))?;
        Ok(Self {
            config,
            mapper,
            dictionary,
            store,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &LocalContentStore {
        &self.store
    }

    /// The feed as loaded from disk. A missing or unreadable feed yields no records.
    pub fn load_records(&self) -> Vec<Option<RawRecord>> {
        match load_feed(&self.config.feed_path) {
            Ok(records) => records,
            Err(err) => {
                warn!(path = %self.config.feed_path.display(), error = %err, "feed unavailable");
                Vec::new()
            }
        }
    }

    /// Runs the mapping layer for a single feed item without touching the store.
    pub fn preview(&self, index: usize) -> Result<NormalizedRecord> {
        let records = load_feed(&self.config.feed_path)?;
        let total = records.len();
        match records.into_iter().nth(index) {
            Some(Some(raw)) => Ok(self.mapper.map(&raw, &self.dictionary)),
            Some(None) => bail!("feed item {index} is not an object"),
            None => bail!("feed has {total} items, index {index} is out of range"),
        }
    }

    pub async fn run_with_report(&self, selection: SyncSelection, skip_duplicates: bool) -> Result<SyncReport> {
        let records = self.load_records();
        let driver = BatchDriver::new(&self.store, &self.mapper, &self.dictionary)
            .with_default_thumbnail(self.config.default_thumbnail.clone())
            .with_feed_path(self.config.feed_path.clone())
            .with_message_limit(self.config.message_limit);
        let report = driver.run(records, selection, skip_duplicates).await;
        self.store.flush().await.context("flushing content store")?;
        Ok(report)
    }

    pub async fn run_once(&self, selection: SyncSelection, skip_duplicates: bool) -> Result<SyncRunSummary> {
        let report = self.run_with_report(selection, skip_duplicates).await?;
        let reports_dir = write_report(&self.config.reports_dir, &report).await?;
        info!(run_id = %report.run_id, reports_dir = %reports_dir.display(), "sync report written");
        Ok(SyncRunSummary::from_report(&report, reports_dir.display().to_string()))
    }
}

//! Batch reconciliation of feed records into the content store.

pub mod batch;
pub mod config;
pub mod duplicates;
pub mod images;
pub mod pipeline;
pub mod reconcile;
pub mod report;

pub use batch::{BatchDriver, ItemOutcome, SelectionError, SyncReport, SyncSelection};
pub use config::{MappingRulesFile, SyncConfig};
pub use duplicates::{DuplicateFilter, DuplicateFilterStats};
pub use images::{gallery_alt_text, ImageReconciler};
pub use pipeline::{SyncPipeline, SyncRunSummary};
pub use reconcile::{PostReconciler, ReconcileError, ReconcileOutcome};
pub use report::write_report;

pub const CRATE_NAME: &str = "propsync-sync";

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use propsync_core::SyncOutcome;
use tokio::fs;

use crate::batch::SyncReport;

pub const REPORT_JSON: &str = "sync_report.json";
pub const SUMMARY_MD: &str = "summary.md";

/// Writes `<reports_root>/<run_id>/` with the JSON report and a short markdown summary.
pub async fn write_report(reports_root: &Path, report: &SyncReport) -> Result<PathBuf> {
    let run_dir = reports_root.join(report.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .await
        .with_context(|| format!("creating {}", run_dir.display()))?;

    let json = serde_json::to_vec_pretty(report).context("serializing sync report")?;
    fs::write(run_dir.join(REPORT_JSON), json)
        .await
        .with_context(|| format!("writing {REPORT_JSON}"))?;

    fs::write(run_dir.join(SUMMARY_MD), render_summary(report))
        .await
        .with_context(|| format!("writing {SUMMARY_MD}"))?;

    Ok(run_dir)
}

pub fn render_summary(report: &SyncReport) -> String {
    let failures = report
        .outcomes
        .iter()
        .filter_map(|item| match &item.outcome {
            SyncOutcome::Error(reason) => Some(format!("- `{}`: {}", item.item_id, reason)),
            _ => None,
        })
        .collect::<Vec<_>>();

    let mut out = format!(
        "# Property Sync Summary\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- Selection: {}\n- Skip duplicates: {}\n- Processed: {}\n- Success: {}\n- Skipped: {}\n- Errors: {}\n",
        report.run_id,
        report.started_at,
        report.finished_at,
        report.selection,
        if report.skip_duplicates { "yes" } else { "no" },
        report.total(),
        report.success,
        report.skipped,
        report.error,
    );
    if let Some(stats) = report.duplicate_filter {
        out.push_str(&format!(
            "- Duplicates dropped: {} of {}\n",
            stats.filtered_out_count, stats.original_count
        ));
    }
    if !failures.is_empty() {
        out.push_str("\n## Errors\n");
        out.push_str(&failures.join("\n"));
        out.push('\n');
    }
    out
}

// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;

use crate::state::write_atomic;

/// One-time metrics registration (so series show up in the export even at zero).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watch_candidates_total", "Candidate items returned by sources.");
        describe_counter!(
            "watch_dedup_identity_total",
            "Candidates dropped as duplicates by normalized URL."
        );
        describe_counter!(
            "watch_dedup_content_total",
            "Candidates dropped as duplicates by title + price."
        );
        describe_counter!("watch_new_items_total", "Items announced as new.");
        describe_counter!("watch_source_errors_total", "Source adapter failures.");
        describe_counter!(
            "watch_polls_skipped_total",
            "Sources skipped because their interval had not elapsed."
        );
        describe_counter!("watch_notify_failures_total", "Failed chunk deliveries per channel.");
        describe_histogram!("watch_fetch_ms", "Feed fetch time in milliseconds.");
        describe_gauge!("watch_last_run_ts", "Unix ts when the last run finished.");
    });
}

/// Install the Prometheus recorder. There is no HTTP listener: the handle is
/// rendered into a textfile after each run.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")?;
    ensure_metrics_described();
    Ok(handle)
}

/// Render the exposition format to `path` (node-exporter textfile collector).
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    write_atomic(path, handle.render().as_bytes())
        .with_context(|| format!("writing metrics to {}", path.display()))
}

//! Reset command.

use console::style;

use crate::models::DownloadStatus;
use crate::pipeline::Pipeline;

/// Parse the `--download-status` value; `None` means every failure status.
fn parse_filter(value: &str) -> anyhow::Result<Option<DownloadStatus>> {
    if value == "all-failures" {
        return Ok(None);
    }
    match DownloadStatus::from_str(value) {
        Some(status) if status.is_failure() => Ok(Some(status)),
        _ => anyhow::bail!(
            "'{}' is not a failure status (expected failure, failure_<code> or all-failures)",
            value
        ),
    }
}

pub async fn cmd_reset(pipeline: &Pipeline, download_status: &str) -> anyhow::Result<()> {
    let filter = parse_filter(download_status)?;
    pipeline.prepare().await?;

    let reset = pipeline.db().urls().reset_downloads(filter).await?;
    println!(
        "{} Reset {} downloads to pending",
        style("✓").green(),
        reset
    );
    Ok(())
}

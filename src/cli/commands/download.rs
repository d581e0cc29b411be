//! Download command.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::models::DownloadStatus;
use crate::pipeline::Pipeline;
use crate::services::DownloadEvent;

pub async fn cmd_download(pipeline: &Pipeline) -> anyhow::Result<()> {
    pipeline.prepare().await?;

    let counts = pipeline.db().urls().status_counts().await?;
    let pending = counts
        .get(&DownloadStatus::Pending.as_str())
        .copied()
        .unwrap_or(0);
    if pending == 0 {
        println!("{} No pending downloads", style("!").yellow());
        println!("  {} Run 'stakeholder ingest' to add URLs", style("→").dim());
        return Ok(());
    }

    println!(
        "{} Downloading {} urls ({} at a time)",
        style("→").cyan(),
        pending,
        pipeline.settings().download.concurrency
    );

    let pb = ProgressBar::new(pending);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    // Event channel for progress updates
    let (event_tx, mut event_rx) = mpsc::channel::<DownloadEvent>(100);
    let progress = pb.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                DownloadEvent::Started { url, .. } => progress.set_message(url),
                DownloadEvent::Completed { .. } => progress.inc(1),
                DownloadEvent::Failed { url, error, .. } => {
                    progress.inc(1);
                    progress.println(format!("  {} {}: {}", style("✗").red(), url, error));
                }
            }
        }
    });

    let result = pipeline.download(event_tx).await;
    let _ = event_handler.await;
    pb.finish_and_clear();
    let result = result?;

    println!(
        "{} Downloaded {} files, {} failed, {} skipped",
        style("✓").green(),
        result.succeeded,
        result.failed,
        result.skipped
    );
    Ok(())
}

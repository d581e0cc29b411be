//! Ingest and clean commands.

use console::style;

use crate::pipeline::Pipeline;
use crate::services::CleanupReport;

fn print_cleanup(report: &CleanupReport) {
    println!(
        "  {} Removed {} placeholders, {} denylisted, {} duplicates",
        style("✓").green(),
        report.sentinels,
        report.denylisted,
        report.duplicates
    );
}

pub async fn cmd_ingest(pipeline: &Pipeline, clean: bool) -> anyhow::Result<()> {
    pipeline.prepare().await?;
    pipeline.load_organizations().await?;

    let (ingest, cleanup) = pipeline.ingest(clean).await?;
    println!(
        "{} Ingested {} rows: {} new urls, {} already known",
        style("✓").green(),
        ingest.rows,
        ingest.added,
        ingest.duplicates
    );
    if ingest.unknown_organization > 0 {
        println!(
            "  {} {} rows refer to organizations not in the database",
            style("!").yellow(),
            ingest.unknown_organization
        );
    }
    if clean {
        print_cleanup(&cleanup);
    }
    Ok(())
}

pub async fn cmd_clean(pipeline: &Pipeline) -> anyhow::Result<()> {
    pipeline.prepare().await?;
    let report = pipeline.clean().await?;
    print_cleanup(&report);
    Ok(())
}

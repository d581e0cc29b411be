//! Search command.

use console::style;

use crate::pipeline::Pipeline;

pub async fn cmd_search(pipeline: &Pipeline, once: bool) -> anyhow::Result<()> {
    pipeline.prepare().await?;
    pipeline.load_organizations().await?;

    let provider = pipeline.default_provider()?;
    println!(
        "{} Searching with {}{}",
        style("→").cyan(),
        provider.name(),
        if once { " (single pass)" } else { "" }
    );

    let reports = pipeline.search_with(provider, once).await?;
    for (i, report) in reports.iter().enumerate() {
        println!(
            "  Pass {}: {} searched, {} with results, {} empty, {} errors",
            i + 1,
            report.searched,
            report.with_results,
            report.no_results,
            report.errors
        );
    }

    if let Some(last) = reports.last() {
        if last.retry_pending > 0 {
            println!(
                "{} {} organizations still need another pass",
                style("!").yellow(),
                last.retry_pending
            );
        }
        if last.timed_out > 0 {
            println!(
                "{} {} organizations timed out and will not be retried",
                style("!").yellow(),
                last.timed_out
            );
        }
    }
    println!(
        "{} Search log: {}",
        style("✓").green(),
        pipeline.settings().search_log_path().display()
    );
    Ok(())
}

//! Run the full pipeline.

use console::style;

use crate::pipeline::Pipeline;

pub async fn cmd_run(pipeline: &Pipeline) -> anyhow::Result<()> {
    println!(
        "{} Running the full pipeline in {}",
        style("→").cyan(),
        pipeline.settings().data_dir.display()
    );

    let report = pipeline.run().await?;

    println!(
        "  Organizations: {} new, {} existing",
        report.organizations.inserted, report.organizations.existing
    );
    let searched: usize = report.search_passes.iter().map(|p| p.searched).sum();
    println!(
        "  Search: {} queries over {} passes",
        searched,
        report.search_passes.len()
    );
    println!(
        "  Ingest: {} new urls, {} removed by cleanup",
        report.ingest.added,
        report.cleanup.total()
    );
    println!(
        "  Download: {} succeeded, {} failed",
        report.download.succeeded, report.download.failed
    );
    println!(
        "  HTML: {} extracted, {} failed",
        report.html.succeeded, report.html.failed
    );
    println!(
        "  PDF: {} extracted, {} failed, {} encrypted",
        report.pdf.succeeded, report.pdf.failed, report.pdf.encrypted
    );
    println!("{} Pipeline finished", style("✓").green());
    Ok(())
}

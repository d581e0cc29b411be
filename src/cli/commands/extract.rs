//! Extract command.

use console::style;

use crate::models::ExtractionKind;
use crate::pipeline::Pipeline;
use crate::services::ExtractionReport;

fn print_report(kind: ExtractionKind, report: &ExtractionReport) {
    println!(
        "{} {}: {} new, {} extracted, {} failed{}",
        style("✓").green(),
        kind.as_str().to_uppercase(),
        report.promoted,
        report.succeeded,
        report.failed,
        if kind == ExtractionKind::Pdf {
            format!(", {} encrypted", report.encrypted)
        } else {
            String::new()
        }
    );
}

/// Extract HTML, PDF or both (the default).
pub async fn cmd_extract(
    pipeline: &Pipeline,
    html_only: bool,
    pdf_only: bool,
    retry_failed: bool,
) -> anyhow::Result<()> {
    pipeline.prepare().await?;

    let mut kinds = Vec::new();
    if !pdf_only {
        kinds.push(ExtractionKind::Html);
    }
    if !html_only {
        kinds.push(ExtractionKind::Pdf);
    }

    for kind in kinds {
        if retry_failed {
            let reset = pipeline.db().extractions(kind).reset_failed().await?;
            if reset > 0 {
                println!(
                    "  {} Retrying {} failed {} extractions",
                    style("→").dim(),
                    reset,
                    kind
                );
            }
        }
        let report = match kind {
            ExtractionKind::Html => pipeline.extract_html().await?,
            ExtractionKind::Pdf => pipeline.extract_pdf().await?,
        };
        print_report(kind, &report);
    }
    Ok(())
}

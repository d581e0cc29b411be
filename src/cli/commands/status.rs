//! Status command.

use std::collections::BTreeMap;

use console::style;

use crate::discovery::{OrgSearchState, SearchLog};
use crate::models::ExtractionKind;
use crate::pipeline::Pipeline;

fn print_counts(title: &str, counts: &BTreeMap<String, u64>) {
    let total: u64 = counts.values().sum();
    println!("{} ({})", style(title).bold(), total);
    if counts.is_empty() {
        println!("  {}", style("none").dim());
    }
    for (status, count) in counts {
        println!("  {:<20} {:>8}", status, count);
    }
}

pub async fn cmd_status(pipeline: &Pipeline) -> anyhow::Result<()> {
    let settings = pipeline.settings();
    if !settings.database_exists() {
        println!(
            "{} No database at {}; run 'stakeholder init' first",
            style("!").yellow(),
            settings.database_path().display()
        );
        return Ok(());
    }

    let db = pipeline.db();
    println!(
        "{} {}",
        style("Organizations:").bold(),
        db.organizations().count().await?
    );

    // Read-only view: classify without rewriting the log
    let log = SearchLog::new(settings.search_log_path());
    let mut search: BTreeMap<String, u64> = BTreeMap::new();
    for (_, urls) in log.load()? {
        let state = match OrgSearchState::classify(&urls, settings.search.failure_threshold) {
            OrgSearchState::Done => "done",
            OrgSearchState::RetryPending => "retry pending",
            OrgSearchState::TimedOut => "timed out",
        };
        *search.entry(state.to_string()).or_default() += 1;
    }
    print_counts("Search", &search);

    print_counts("Downloads", &db.urls().status_counts().await?);
    for kind in [ExtractionKind::Html, ExtractionKind::Pdf] {
        let title = format!("{} extraction", kind.as_str().to_uppercase());
        print_counts(&title, &db.extractions(kind).status_counts().await?);
    }
    Ok(())
}

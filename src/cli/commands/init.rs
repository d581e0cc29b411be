//! Initialize command.

use console::style;

use crate::pipeline::Pipeline;

/// Create the data directory layout and the database.
pub async fn cmd_init(pipeline: &Pipeline) -> anyhow::Result<()> {
    let settings = pipeline.settings();
    pipeline.prepare().await?;

    if settings.organizations_file.exists() {
        let report = pipeline.load_organizations().await?;
        println!(
            "  {} Loaded {} organizations ({} already present)",
            style("✓").green(),
            report.inserted,
            report.existing
        );
    } else {
        println!(
            "{} No organizations file at {}",
            style("!").yellow(),
            settings.organizations_file.display()
        );
        println!("  Add a CSV with columns org_title,search_title,reg_category to get started");
    }

    println!(
        "{} Initialized stakeholder data in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    Ok(())
}

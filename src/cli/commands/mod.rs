//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod download;
mod extract;
mod ingest;
mod init;
mod reset;
mod run;
mod search;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};
use crate::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "stakeholder")]
#[command(about = "Stakeholder document acquisition pipeline")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, short = 't', global = true)]
    target: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Search for candidate documents per organization
    Search {
        /// Run a single pass instead of repeating until every organization is settled
        #[arg(long)]
        once: bool,
    },

    /// Load the search log into the database
    Ingest {
        /// Skip the cleanup passes after ingesting
        #[arg(long)]
        no_clean: bool,
    },

    /// Remove placeholder, denylisted and duplicate URLs
    Clean,

    /// Download pending URLs
    Download,

    /// Extract text from downloaded files
    Extract {
        /// Only extract HTML files
        #[arg(long, conflicts_with = "pdf")]
        html: bool,
        /// Only extract PDF files
        #[arg(long)]
        pdf: bool,
        /// Return failed extractions to pending first
        #[arg(long)]
        retry_failed: bool,
    },

    /// Run every stage in order
    Run,

    /// Show per-stage status counts
    Status,

    /// Return failed downloads to pending
    Reset {
        /// Failure status to reset: failure, failure_403, failure_404 or all-failures
        #[arg(long, value_name = "STATUS")]
        download_status: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        target: cli.target,
    };
    let (settings, config) = load_settings(options)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    if let Some(path) = &config.source_path {
        tracing::info!("Using config {}", path.display());
    }

    let pipeline = Pipeline::new(settings);

    match cli.command {
        Commands::Init => init::cmd_init(&pipeline).await,
        Commands::Search { once } => search::cmd_search(&pipeline, once).await,
        Commands::Ingest { no_clean } => ingest::cmd_ingest(&pipeline, !no_clean).await,
        Commands::Clean => ingest::cmd_clean(&pipeline).await,
        Commands::Download => download::cmd_download(&pipeline).await,
        Commands::Extract {
            html,
            pdf,
            retry_failed,
        } => extract::cmd_extract(&pipeline, html, pdf, retry_failed).await,
        Commands::Run => run::cmd_run(&pipeline).await,
        Commands::Status => status::cmd_status(&pipeline).await,
        Commands::Reset { download_status } => {
            reset::cmd_reset(&pipeline, &download_status).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn extract_flags_conflict() {
        let result = Cli::try_parse_from(["stakeholder", "extract", "--html", "--pdf"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_target_after_subcommand() {
        let cli = Cli::try_parse_from(["stakeholder", "status", "--target", "/data"]).unwrap();
        assert_eq!(cli.target, Some(PathBuf::from("/data")));
        assert!(matches!(cli.command, Commands::Status));
    }
}

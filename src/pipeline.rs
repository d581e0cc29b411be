//! Orchestrator: runs the stages in order against one data directory.
//!
//! Every stage is also exposed on its own so the CLI can run it alone.

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Settings;
use crate::discovery::{DuckDuckGoProvider, SearchLog, SearchPassReport, SearchProvider, SearchStage};
use crate::extraction::{PopplerPdfBackend, ScraperHtmlBackend};
use crate::http_client::{HttpClient, UserAgent};
use crate::repository::DbContext;
use crate::services::{
    CleanupReport, Denylist, DownloadEvent, DownloadResult, DownloadService, ExtractionPaths,
    ExtractionReport, HtmlErrorLog, HtmlExtractionService, IngestReport, IngestService,
    OrganizationLoadReport, PdfExtractionService,
};

/// Results of a full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub organizations: OrganizationLoadReport,
    pub search_passes: Vec<SearchPassReport>,
    pub ingest: IngestReport,
    pub cleanup: CleanupReport,
    pub download: DownloadResult,
    pub html: ExtractionReport,
    pub pdf: ExtractionReport,
}

pub struct Pipeline {
    settings: Settings,
    ctx: DbContext,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        let ctx = settings.db_context();
        Self { settings, ctx }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn db(&self) -> &DbContext {
        &self.ctx
    }

    /// Create the directory layout and the database schema.
    pub async fn prepare(&self) -> anyhow::Result<()> {
        self.settings
            .ensure_directories()
            .context("failed to create data directories")?;
        self.ctx
            .init_schema()
            .await
            .context("failed to initialize database")?;
        Ok(())
    }

    fn ingest_service(&self) -> anyhow::Result<IngestService> {
        let denylist = Denylist::from_options(&self.settings.cleanup)
            .context("invalid search results pattern")?;
        Ok(IngestService::new(self.ctx.clone(), denylist))
    }

    /// Load the organizations file into the store.
    ///
    /// A missing file is tolerated when the store already has organizations.
    pub async fn load_organizations(&self) -> anyhow::Result<OrganizationLoadReport> {
        let path = &self.settings.organizations_file;
        if !path.exists() {
            let existing = self.ctx.organizations().count().await?;
            if existing == 0 {
                bail!("organizations file {} not found", path.display());
            }
            warn!(
                "Organizations file {} not found; using {} organizations already stored",
                path.display(),
                existing
            );
            return Ok(OrganizationLoadReport {
                existing: existing as usize,
                ..Default::default()
            });
        }
        Ok(self.ingest_service()?.load_organizations(path).await?)
    }

    /// Search titles of every stored organization, in insertion order.
    pub async fn search_titles(&self) -> anyhow::Result<Vec<String>> {
        let orgs = self.ctx.organizations().get_all().await?;
        Ok(orgs.into_iter().map(|o| o.search_title).collect())
    }

    /// The DuckDuckGo provider configured from settings.
    pub fn default_provider(&self) -> anyhow::Result<Box<dyn SearchProvider>> {
        let client = HttpClient::new(
            self.settings.search.request_timeout,
            &UserAgent::from_setting(self.settings.search.user_agent.as_deref()),
        )
        .context("failed to build HTTP client")?;
        Ok(Box::new(DuckDuckGoProvider::new(client)))
    }

    /// Run one search pass, or passes until nothing is retryable.
    pub async fn search_with(
        &self,
        provider: Box<dyn SearchProvider>,
        once: bool,
    ) -> anyhow::Result<Vec<SearchPassReport>> {
        let titles = self.search_titles().await?;
        if titles.is_empty() {
            warn!("No organizations to search");
            return Ok(Vec::new());
        }
        let stage = SearchStage::new(
            provider,
            SearchLog::new(self.settings.search_log_path()),
            self.settings.search.clone(),
        );
        if once {
            Ok(vec![stage.run_pass(&titles).await?])
        } else {
            Ok(stage.run_until_settled(&titles).await?)
        }
    }

    /// Ingest the search log, optionally followed by cleanup.
    pub async fn ingest(&self, clean: bool) -> anyhow::Result<(IngestReport, CleanupReport)> {
        let service = self.ingest_service()?;
        let log = SearchLog::new(self.settings.search_log_path());
        let ingest = service.ingest_search_log(&log).await?;
        let cleanup = if clean {
            service.clean().await?
        } else {
            CleanupReport::default()
        };
        Ok((ingest, cleanup))
    }

    pub async fn clean(&self) -> anyhow::Result<CleanupReport> {
        Ok(self.ingest_service()?.clean().await?)
    }

    pub async fn download(
        &self,
        event_tx: mpsc::Sender<DownloadEvent>,
    ) -> anyhow::Result<DownloadResult> {
        let service = DownloadService::new(
            self.ctx.clone(),
            self.settings.downloads_dir.clone(),
            self.settings.download.clone(),
            self.settings.db_retry.clone(),
        );
        Ok(service.download(event_tx).await?)
    }

    pub async fn extract_html(&self) -> anyhow::Result<ExtractionReport> {
        let service = HtmlExtractionService::new(
            self.ctx.clone(),
            ExtractionPaths {
                downloads_dir: self.settings.downloads_dir.clone(),
                output_dir: self.settings.html_text_dir.clone(),
            },
            HtmlErrorLog::new(self.settings.html_error_log_path()),
            Box::new(ScraperHtmlBackend::new()),
            self.settings.db_retry.clone(),
        );
        Ok(service.run().await?)
    }

    pub async fn extract_pdf(&self) -> anyhow::Result<ExtractionReport> {
        let mut service = PdfExtractionService::new(
            self.ctx.clone(),
            ExtractionPaths {
                downloads_dir: self.settings.downloads_dir.clone(),
                output_dir: self.settings.pdf_text_dir.clone(),
            },
            Box::new(PopplerPdfBackend::new(self.settings.extraction.clone())),
            self.settings.db_retry.clone(),
        );
        Ok(service.run().await?)
    }

    /// Run every stage with the DuckDuckGo provider.
    pub async fn run(&self) -> anyhow::Result<PipelineReport> {
        let provider = self.default_provider()?;
        self.run_with(provider).await
    }

    /// Run every stage in order with the given search provider.
    pub async fn run_with(
        &self,
        provider: Box<dyn SearchProvider>,
    ) -> anyhow::Result<PipelineReport> {
        self.prepare().await?;

        let organizations = self.load_organizations().await?;
        info!("Stage 1/5: search");
        let search_passes = self.search_with(provider, false).await?;

        info!("Stage 2/5: ingest and clean");
        let (ingest, cleanup) = self.ingest(true).await?;

        info!("Stage 3/5: download");
        let (event_tx, mut event_rx) = mpsc::channel::<DownloadEvent>(100);
        let drain = tokio::spawn(async move { while event_rx.recv().await.is_some() {} });
        let download = self.download(event_tx).await?;
        let _ = drain.await;

        info!("Stage 4/5: HTML extraction");
        let html = self.extract_html().await?;

        info!("Stage 5/5: PDF extraction");
        let pdf = self.extract_pdf().await?;

        Ok(PipelineReport {
            organizations,
            search_passes,
            ingest,
            cleanup,
            download,
            html,
            pdf,
        })
    }
}

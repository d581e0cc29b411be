//! Extraction stage: turn downloaded HTML and PDF files into JSON artifacts.
//!
//! Both sub-pipelines promote eligible downloads, then walk the `pending`
//! records one file at a time. Records in a terminal status are never
//! touched again.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::extraction::{write_json_atomic, ExtractionError, HtmlBackend, PdfBackend};
use crate::models::{ExtractStatus, ExtractionKind, ExtractionRecord};
use crate::repository::{retry_on_busy, DbContext, DbError, ExtractionRepository, RetryPolicy};

#[derive(Debug, Error)]
pub enum ExtractionStageError {
    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Backend(#[from] ExtractionError),

    #[error("failed to write error log: {0}")]
    ErrorLog(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counts from one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Records newly created from successful downloads.
    pub promoted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub encrypted: usize,
}

/// Where an extraction stage reads and writes.
#[derive(Debug, Clone)]
pub struct ExtractionPaths {
    pub downloads_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// CSV log of failed HTML extractions.
#[derive(Debug, Clone)]
pub struct HtmlErrorLog {
    path: PathBuf,
}

impl HtmlErrorLog {
    const HEADER: [&'static str; 4] = ["file_id", "organization_id", "file_path", "error_message"];

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first if the file is new.
    pub fn append(
        &self,
        record: &ExtractionRecord,
        message: &str,
    ) -> Result<(), ExtractionStageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(Self::HEADER)?;
        }
        writer.write_record([
            record.id.to_string().as_str(),
            record.organization_id.to_string().as_str(),
            record.source_file.as_str(),
            message,
        ])?;
        writer.flush()?;
        Ok(())
    }
}

async fn mark(
    repo: &ExtractionRepository,
    retry: &RetryPolicy,
    id: i32,
    status: ExtractStatus,
    artifact: Option<&Path>,
) -> Result<(), DbError> {
    let artifact = artifact.map(|p| p.to_string_lossy().into_owned());
    let changed = retry_on_busy(retry, || repo.mark(id, status, artifact.as_deref())).await?;
    if !changed {
        debug!("{} record {} was no longer pending", repo.kind(), id);
    }
    Ok(())
}

/// HTML sub-pipeline.
pub struct HtmlExtractionService {
    ctx: DbContext,
    paths: ExtractionPaths,
    error_log: HtmlErrorLog,
    backend: Box<dyn HtmlBackend>,
    retry: RetryPolicy,
}

impl HtmlExtractionService {
    pub fn new(
        ctx: DbContext,
        paths: ExtractionPaths,
        error_log: HtmlErrorLog,
        backend: Box<dyn HtmlBackend>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ctx,
            paths,
            error_log,
            backend,
            retry,
        }
    }

    pub async fn run(&self) -> Result<ExtractionReport, ExtractionStageError> {
        let repo = self.ctx.extractions(ExtractionKind::Html);
        let mut report = ExtractionReport {
            promoted: repo.promote_eligible().await?,
            ..Default::default()
        };

        let pending = repo.get_pending().await?;
        info!("Extracting text from {} HTML files", pending.len());

        for record in pending {
            let source = self.paths.downloads_dir.join(&record.source_file);
            let result = self.backend.extract(&source).and_then(|doc| {
                write_json_atomic(&self.paths.output_dir, &record.artifact_name(), &doc)
            });

            match result {
                Ok(artifact) => {
                    mark(&repo, &self.retry, record.id, ExtractStatus::Success, Some(&artifact))
                        .await?;
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!("HTML extraction failed for {}: {}", record.source_file, e);
                    if let Err(log_err) = self.error_log.append(&record, &e.to_string()) {
                        error!("Cannot write HTML error log: {}", log_err);
                    }
                    mark(&repo, &self.retry, record.id, ExtractStatus::Failure, None).await?;
                    report.failed += 1;
                }
            }
        }

        info!(
            "HTML extraction: {} succeeded, {} failed",
            report.succeeded, report.failed
        );
        Ok(report)
    }
}

/// Find the downloaded PDF, giving it a `.pdf` suffix if it lacks one.
pub fn resolve_pdf(downloads_dir: &Path, source_file: &str) -> std::io::Result<PathBuf> {
    let bare = downloads_dir.join(source_file.trim());
    if bare.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")) && bare.exists() {
        return Ok(bare);
    }

    let mut with_suffix = bare.clone().into_os_string();
    with_suffix.push(".pdf");
    let with_suffix = PathBuf::from(with_suffix);
    if with_suffix.exists() {
        return Ok(with_suffix);
    }

    if bare.exists() {
        debug!("Renaming {} -> {}", bare.display(), with_suffix.display());
        std::fs::rename(&bare, &with_suffix)?;
        return Ok(with_suffix);
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("downloaded file {} not found", bare.display()),
    ))
}

/// PDF sub-pipeline.
pub struct PdfExtractionService {
    ctx: DbContext,
    paths: ExtractionPaths,
    backend: Box<dyn PdfBackend>,
    retry: RetryPolicy,
}

impl PdfExtractionService {
    pub fn new(
        ctx: DbContext,
        paths: ExtractionPaths,
        backend: Box<dyn PdfBackend>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ctx,
            paths,
            backend,
            retry,
        }
    }

    /// Process every pending PDF.
    ///
    /// A missing external tool aborts the run; any other error fails only
    /// the file at hand.
    pub async fn run(&mut self) -> Result<ExtractionReport, ExtractionStageError> {
        let repo = self.ctx.extractions(ExtractionKind::Pdf);
        let mut report = ExtractionReport {
            promoted: repo.promote_eligible().await?,
            ..Default::default()
        };

        let pending = repo.get_pending().await?;
        info!("Extracting text from {} PDF files", pending.len());

        for record in pending {
            let path = match resolve_pdf(&self.paths.downloads_dir, &record.source_file) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Skipping PDF {}: {}", record.source_file, e);
                    mark(&repo, &self.retry, record.id, ExtractStatus::Failure, None).await?;
                    report.failed += 1;
                    continue;
                }
            };

            match self.backend.is_encrypted(&path) {
                Ok(true) => {
                    info!("Skipping encrypted PDF {}", path.display());
                    mark(&repo, &self.retry, record.id, ExtractStatus::Encrypted, None).await?;
                    report.encrypted += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("Cannot inspect {}: {}", path.display(), e);
                    mark(&repo, &self.retry, record.id, ExtractStatus::Failure, None).await?;
                    report.failed += 1;
                    continue;
                }
            }

            let result = self.backend.extract(&path).and_then(|doc| {
                write_json_atomic(&self.paths.output_dir, &record.artifact_name(), &doc)
            });
            self.backend.reset_state();

            match result {
                Ok(artifact) => {
                    debug!("Saved {}", artifact.display());
                    mark(&repo, &self.retry, record.id, ExtractStatus::Success, Some(&artifact))
                        .await?;
                    report.succeeded += 1;
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("PDF extraction failed for {}: {}", path.display(), e);
                    mark(&repo, &self.retry, record.id, ExtractStatus::Failure, None).await?;
                    report.failed += 1;
                }
            }
        }

        info!(
            "PDF extraction: {} succeeded, {} failed, {} encrypted",
            report.succeeded, report.failed, report.encrypted
        );
        Ok(report)
    }
}

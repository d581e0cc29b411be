//! Service layer for the pipeline stages.
//!
//! This module contains domain logic separated from UI concerns.
//! Services are driven by the CLI and by the orchestrator.

pub mod download;
pub mod extraction;
pub mod ingest;

pub use download::{DownloadError, DownloadEvent, DownloadOutcome, DownloadResult, DownloadService};
pub use extraction::{
    ExtractionPaths, ExtractionReport, ExtractionStageError, HtmlErrorLog, HtmlExtractionService,
    PdfExtractionService,
};
pub use ingest::{CleanupReport, Denylist, IngestError, IngestReport, IngestService, OrganizationLoadReport};

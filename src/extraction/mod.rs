//! Text extraction backends.
//!
//! The extraction stage talks to these traits only; concrete backends are
//! built once per run and passed in.

mod artifact;
mod html;
mod pdf;

use std::path::Path;

use thiserror::Error;

pub use artifact::write_json_atomic;
pub use html::{HtmlDocument, ScraperHtmlBackend};
pub use pdf::{PdfDocument, PopplerPdfBackend};

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("No text content found")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to move artifact into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl ExtractionError {
    /// Errors that affect every file, not just the current one.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ToolNotFound(_))
    }
}

/// Extracts main text and metadata from a saved HTML page.
pub trait HtmlBackend: Send + Sync {
    fn extract(&self, path: &Path) -> Result<HtmlDocument, ExtractionError>;
}

/// Extracts per-page text from a PDF.
pub trait PdfBackend: Send {
    /// Whether the document needs a password to open.
    fn is_encrypted(&self, path: &Path) -> Result<bool, ExtractionError>;

    fn extract(&mut self, path: &Path) -> Result<PdfDocument, ExtractionError>;

    /// Release resources held for the last document.
    fn reset_state(&mut self);
}

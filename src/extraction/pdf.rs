//! PDF text extraction using poppler-utils, with Tesseract OCR for sparse pages.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tempfile::TempDir;
use tracing::{debug, warn};

use super::{ExtractionError, PdfBackend};
use crate::config::ExtractionOptions;

/// Text extracted from one PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfDocument {
    pub file_name: String,
    /// Page texts in order, serialized as `{"page_1": ..., "page_2": ...}`.
    #[serde(serialize_with = "serialize_pages")]
    pub pages: Vec<String>,
    /// ISO 639-3 code detected from the first page, or `unknown`.
    pub language: String,
    pub total_pages: usize,
}

fn serialize_pages<S: Serializer>(pages: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pages.len()))?;
    for (i, text) in pages.iter().enumerate() {
        map.serialize_entry(&format!("page_{}", i + 1), text)?;
    }
    map.end()
}

/// Handle command output, extracting stdout on success or returning appropriate error.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, ExtractionError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExtractionError::ExtractionFailed(format!(
                    "{}: {}",
                    error_prefix,
                    stderr.trim()
                )))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

fn non_whitespace_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Page count from `pdfinfo` output.
fn parse_page_count(info: &str) -> Option<usize> {
    info.lines()
        .find(|l| l.starts_with("Pages:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|n| n.parse().ok())
}

/// Encryption flag from `pdfinfo` output.
fn parse_encrypted(info: &str) -> bool {
    info.lines()
        .find(|l| l.starts_with("Encrypted:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .is_some_and(|v| v == "yes")
}

/// Language of a text as an ISO 639-3 code.
fn detect_language(text: &str) -> String {
    whatlang::detect(text)
        .map(|info| info.lang().code().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// PDF backend driving `pdfinfo`, `pdftotext`, `pdftoppm` and `tesseract`.
pub struct PopplerPdfBackend {
    options: ExtractionOptions,
    /// Page renders for the current document; dropped by `reset_state`.
    scratch: Option<TempDir>,
    ocr_available: bool,
}

impl PopplerPdfBackend {
    pub fn new(options: ExtractionOptions) -> Self {
        let ocr_available = options.ocr_enabled
            && which::which("tesseract").is_ok()
            && which::which("pdftoppm").is_ok();
        if options.ocr_enabled && !ocr_available {
            warn!("tesseract or pdftoppm not found; OCR disabled");
        }
        Self {
            options,
            scratch: None,
            ocr_available,
        }
    }

    fn pdfinfo(&self, path: &Path) -> Result<std::process::Output, ExtractionError> {
        Command::new("pdfinfo").arg(path).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractionError::ToolNotFound("pdfinfo (install poppler-utils)".to_string())
            } else {
                ExtractionError::Io(e)
            }
        })
    }

    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError> {
        let output = self.pdfinfo(path)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            return Err(ExtractionError::ExtractionFailed(format!(
                "pdfinfo failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_page_count(&stdout)
            .ok_or_else(|| ExtractionError::ExtractionFailed("no page count".to_string()))
    }

    fn page_text(&self, path: &Path, page: usize) -> Result<String, ExtractionError> {
        let page_str = page.to_string();
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8", "-f", &page_str, "-l", &page_str])
            .arg(path)
            .arg("-")
            .output();

        handle_cmd_output(
            output,
            "pdftotext (install poppler-utils)",
            &format!("pdftotext failed on page {}", page),
        )
    }

    fn scratch_dir(&mut self) -> Result<PathBuf, ExtractionError> {
        if self.scratch.is_none() {
            self.scratch = Some(TempDir::new()?);
        }
        match &self.scratch {
            Some(dir) => Ok(dir.path().to_path_buf()),
            None => Err(ExtractionError::ExtractionFailed(
                "no scratch directory".to_string(),
            )),
        }
    }

    /// Render one page and run Tesseract on it.
    fn ocr_page(&mut self, path: &Path, page: usize) -> Result<String, ExtractionError> {
        let dir = self.scratch_dir()?;
        let prefix = dir.join(format!("page-{}", page));
        let page_str = page.to_string();
        let dpi = self.options.ocr_dpi.to_string();

        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi, "-f", &page_str, "-l", &page_str, "-singlefile"])
            .arg(path)
            .arg(&prefix)
            .status();
        match status {
            Ok(s) if s.success() => {}
            Ok(_) => {
                return Err(ExtractionError::ExtractionFailed(format!(
                    "pdftoppm failed to render page {}",
                    page
                )))
            }
            Err(e) => return Err(ExtractionError::Io(e)),
        }

        let image = prefix.with_extension("png");
        let output = Command::new("tesseract")
            .arg(&image)
            .arg("stdout")
            .args(["-l", &self.options.ocr_language])
            .output();
        let text = handle_cmd_output(output, "tesseract", "tesseract failed");
        let _ = std::fs::remove_file(&image);
        text
    }
}

impl PdfBackend for PopplerPdfBackend {
    fn is_encrypted(&self, path: &Path) -> Result<bool, ExtractionError> {
        let output = self.pdfinfo(path)?;
        if output.status.success() {
            return Ok(parse_encrypted(&String::from_utf8_lossy(&output.stdout)));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("Incorrect password") {
            return Ok(true);
        }
        Err(ExtractionError::ExtractionFailed(format!(
            "pdfinfo failed: {}",
            stderr.trim()
        )))
    }

    fn extract(&mut self, path: &Path) -> Result<PdfDocument, ExtractionError> {
        let total_pages = self.page_count(path)?;
        let mut pages = Vec::with_capacity(total_pages);

        for page in 1..=total_pages {
            let mut text = self.page_text(path, page)?;
            let chars = non_whitespace_chars(&text);

            if self.ocr_available && chars < self.options.ocr_min_chars {
                match self.ocr_page(path, page) {
                    // Keep OCR only if it has noticeably more content
                    Ok(ocr) if non_whitespace_chars(&ocr) > chars + chars / 5 => {
                        debug!("Using OCR text for page {}", page);
                        text = ocr;
                    }
                    Ok(_) => {}
                    Err(e) => debug!("OCR failed for page {}: {}", page, e),
                }
            }
            pages.push(text.trim().to_string());
        }

        let language = pages
            .first()
            .map(|t| detect_language(t))
            .unwrap_or_else(|| "unknown".to_string());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(PdfDocument {
            file_name,
            pages,
            language,
            total_pages,
        })
    }

    fn reset_state(&mut self) {
        self.scratch = None;
    }
}

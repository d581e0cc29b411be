//! Resolved application settings.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::repository::{DbContext, RetryPolicy};

/// Default database filename inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "stakeholder.db";

const DOWNLOADS_SUBDIR: &str = "raw_data/url_downloads";
const LOGS_SUBDIR: &str = "raw_data/logs";
const HTML_TEXT_SUBDIR: &str = "processed_data/html_text";
const PDF_TEXT_SUBDIR: &str = "processed_data/pdf_text";
const ORGANIZATIONS_FILE: &str = "input_data/organisation_titles.csv";

const SEARCH_LOG_FILENAME: &str = "ddg_search_results.csv";
const HTML_ERROR_LOG_FILENAME: &str = "html_extraction_errors.csv";

/// Search stage options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Query with `{organization}` replaced by the search title.
    pub query_template: String,
    pub max_results: usize,
    /// Failures (`rate_limited` or `error`) after which an organization times out.
    pub failure_threshold: usize,
    /// Sleep after a provider error before the next organization.
    pub error_cooldown: Duration,
    /// Random inter-query delay bounds.
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Sleep between search passes while organizations remain retryable.
    pub pass_interval: Duration,
    pub request_timeout: Duration,
    /// User agent setting, see `http_client::UserAgent`.
    pub user_agent: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            query_template: "\"{organization}\" +CBAM future".to_string(),
            max_results: 20,
            failure_threshold: 3,
            error_cooldown: Duration::from_secs(80),
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            pass_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: Some("impersonate".to_string()),
        }
    }
}

impl SearchOptions {
    /// Build the query for one organization.
    pub fn query_for(&self, organization: &str) -> String {
        self.query_template.replace("{organization}", organization)
    }
}

/// Download stage options.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Maximum in-flight fetches.
    pub concurrency: usize,
    pub request_timeout: Duration,
    /// Random post-request delay bounds; the permit is held while sleeping.
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Lowercase phrases that mark a page as paywalled.
    pub paywall_phrases: Vec<String>,
    /// Pages shorter than this many characters are flagged as possible paywalls.
    pub min_page_chars: usize,
    pub user_agent: Option<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            request_timeout: Duration::from_secs(30),
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            paywall_phrases: [
                "log in to read",
                "paywall",
                "membership required",
                "register to continue",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_page_chars: 200,
            user_agent: None,
        }
    }
}

/// URL cleanup options.
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Platform names removed wherever they appear in a URL.
    pub denylisted_platforms: Vec<String>,
    /// Regex matching search-engine result pages.
    pub search_results_pattern: String,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            denylisted_platforms: [
                "linkedin",
                "facebook",
                "instagram",
                "twitter",
                "tiktok",
                "tandfonline",
                "wikipedia",
                "sciencedirect",
                "springer",
                "researchgate",
                "glassdoor",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            search_results_pattern: r"(https?://)?(www\.)?google\.com/search\?".to_string(),
        }
    }
}

/// Text extraction options.
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Run Tesseract on pages whose text layer is sparse.
    pub ocr_enabled: bool,
    /// Tesseract language code.
    pub ocr_language: String,
    /// Pages with fewer non-whitespace characters than this are OCRed.
    pub ocr_min_chars: usize,
    /// Render resolution for OCR.
    pub ocr_dpi: u32,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            ocr_language: "eng".to_string(),
            ocr_min_chars: 50,
            ocr_dpi: 300,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Organizations input file.
    pub organizations_file: PathBuf,
    pub downloads_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub html_text_dir: PathBuf,
    pub pdf_text_dir: PathBuf,
    pub search: SearchOptions,
    pub download: DownloadOptions,
    pub cleanup: CleanupOptions,
    pub extraction: ExtractionOptions,
    /// Retry policy for writes that hit a locked database.
    pub db_retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stakeholder-data");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Create settings with a custom data directory and the standard layout.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            organizations_file: data_dir.join(ORGANIZATIONS_FILE),
            downloads_dir: data_dir.join(DOWNLOADS_SUBDIR),
            logs_dir: data_dir.join(LOGS_SUBDIR),
            html_text_dir: data_dir.join(HTML_TEXT_SUBDIR),
            pdf_text_dir: data_dir.join(PDF_TEXT_SUBDIR),
            data_dir,
            search: SearchOptions::default(),
            download: DownloadOptions::default(),
            cleanup: CleanupOptions::default(),
            extraction: ExtractionOptions::default(),
            db_retry: RetryPolicy::default(),
        }
    }

    /// Re-root every derived directory under a new data directory.
    pub fn set_data_dir(&mut self, data_dir: PathBuf) {
        let organizations_file = if self.organizations_file.starts_with(&self.data_dir) {
            data_dir.join(ORGANIZATIONS_FILE)
        } else {
            self.organizations_file.clone()
        };
        self.downloads_dir = data_dir.join(DOWNLOADS_SUBDIR);
        self.logs_dir = data_dir.join(LOGS_SUBDIR);
        self.html_text_dir = data_dir.join(HTML_TEXT_SUBDIR);
        self.pdf_text_dir = data_dir.join(PDF_TEXT_SUBDIR);
        self.organizations_file = organizations_file;
        self.data_dir = data_dir;
    }

    /// Get the full path to the database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Append-only search log.
    pub fn search_log_path(&self) -> PathBuf {
        self.logs_dir.join(SEARCH_LOG_FILENAME)
    }

    /// CSV of failed HTML extractions.
    pub fn html_error_log_path(&self) -> PathBuf {
        self.logs_dir.join(HTML_ERROR_LOG_FILENAME)
    }

    /// Create a database context for the configured database file.
    pub fn db_context(&self) -> DbContext {
        DbContext::new(&self.database_path())
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        let dirs = [
            ("data", &self.data_dir),
            ("downloads", &self.downloads_dir),
            ("logs", &self.logs_dir),
            ("HTML text", &self.html_text_dir),
            ("PDF text", &self.pdf_text_dir),
        ];
        for (label, dir) in dirs {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_data_dir() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/data"));
        assert_eq!(
            settings.downloads_dir,
            PathBuf::from("/data/raw_data/url_downloads")
        );

        settings.set_data_dir(PathBuf::from("/other"));
        assert_eq!(settings.pdf_text_dir, PathBuf::from("/other/processed_data/pdf_text"));
        assert_eq!(
            settings.organizations_file,
            PathBuf::from("/other/input_data/organisation_titles.csv")
        );
        assert_eq!(settings.database_path(), PathBuf::from("/other/stakeholder.db"));
    }

    #[test]
    fn query_template_substitutes_organization() {
        let search = SearchOptions {
            query_template: "\"{organization}\" CBAM".to_string(),
            ..Default::default()
        };
        assert_eq!(search.query_for("Eurofer"), "\"Eurofer\" CBAM");
    }

    #[test]
    fn ensure_directories_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path().to_path_buf());
        settings.ensure_directories().unwrap();
        assert!(settings.downloads_dir.is_dir());
        assert!(settings.html_text_dir.is_dir());
    }
}

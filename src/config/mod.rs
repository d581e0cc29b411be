//! Configuration management using the prefer crate for file discovery.
//!
//! A config file only overrides what it names; everything else keeps the
//! defaults in [`Settings`].

mod loader;
mod settings;

pub use loader::{load_settings, LoadOptions};
pub use settings::{
    CleanupOptions, DownloadOptions, ExtractionOptions, SearchOptions, Settings,
    DEFAULT_DATABASE_FILENAME,
};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `[search]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<usize>,
    /// Seconds to sleep after a provider error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_cooldown_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_delay_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_interval_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// `[download]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// Request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_delay_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paywall_phrases: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_page_chars: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// `[cleanup]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denylisted_platforms: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_results_pattern: Option<String>,
}

/// `[extraction]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_min_chars: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_dpi: Option<u32>,
}

/// `[database]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Attempts for a write that hits a locked database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy_backoff_secs: Option<f64>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory path.
    #[serde(skip_serializing_if = "Option::is_none", alias = "target")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Organizations input CSV.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizations_file: Option<String>,
    pub search: SearchConfig,
    pub download: DownloadConfig,
    pub cleanup: CleanupConfig,
    pub extraction: ExtractionConfig,
    pub database_retry: DatabaseConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Discovers `stakeholder.{toml,yaml,json,...}` in the standard locations.
    pub async fn load() -> Self {
        match prefer::load("stakeholder").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}; using defaults", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.set_data_dir(self.resolve_path(data_dir, base_dir));
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref file) = self.organizations_file {
            settings.organizations_file = self.resolve_path(file, base_dir);
        }

        let search = &mut settings.search;
        if let Some(ref template) = self.search.query_template {
            search.query_template = template.clone();
        }
        if let Some(n) = self.search.max_results {
            search.max_results = n;
        }
        if let Some(n) = self.search.failure_threshold {
            search.failure_threshold = n.max(1);
        }
        if let Some(s) = self.search.error_cooldown_secs {
            search.error_cooldown = secs(s);
        }
        if let Some(s) = self.search.min_delay_secs {
            search.min_delay = secs(s);
        }
        if let Some(s) = self.search.max_delay_secs {
            search.max_delay = secs(s);
        }
        if let Some(s) = self.search.pass_interval_secs {
            search.pass_interval = secs(s);
        }
        if let Some(t) = self.search.request_timeout {
            search.request_timeout = Duration::from_secs(t);
        }
        if let Some(ref ua) = self.search.user_agent {
            search.user_agent = Some(ua.clone());
        }

        let download = &mut settings.download;
        if let Some(n) = self.download.concurrency {
            download.concurrency = n.max(1);
        }
        if let Some(t) = self.download.request_timeout {
            download.request_timeout = Duration::from_secs(t);
        }
        if let Some(s) = self.download.min_delay_secs {
            download.min_delay = secs(s);
        }
        if let Some(s) = self.download.max_delay_secs {
            download.max_delay = secs(s);
        }
        if let Some(ref phrases) = self.download.paywall_phrases {
            download.paywall_phrases = phrases.iter().map(|p| p.to_lowercase()).collect();
        }
        if let Some(n) = self.download.min_page_chars {
            download.min_page_chars = n;
        }
        if let Some(ref ua) = self.download.user_agent {
            download.user_agent = Some(ua.clone());
        }

        if let Some(ref platforms) = self.cleanup.denylisted_platforms {
            settings.cleanup.denylisted_platforms = platforms.clone();
        }
        if let Some(ref pattern) = self.cleanup.search_results_pattern {
            settings.cleanup.search_results_pattern = pattern.clone();
        }

        let extraction = &mut settings.extraction;
        if let Some(ocr) = self.extraction.ocr {
            extraction.ocr_enabled = ocr;
        }
        if let Some(ref lang) = self.extraction.ocr_language {
            extraction.ocr_language = lang.clone();
        }
        if let Some(n) = self.extraction.ocr_min_chars {
            extraction.ocr_min_chars = n;
        }
        if let Some(dpi) = self.extraction.ocr_dpi {
            extraction.ocr_dpi = dpi;
        }

        if let Some(n) = self.database_retry.busy_retries {
            settings.db_retry.max_attempts = n.max(1);
        }
        if let Some(s) = self.database_retry.busy_backoff_secs {
            settings.db_retry.backoff = secs(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_toml_and_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stakeholder.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "data"

[search]
query_template = "{organization} climate"
failure_threshold = 4

[download]
concurrency = 2
paywall_phrases = ["Subscribe Now"]

[database_retry]
busy_backoff_secs = 0.5
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::with_data_dir(PathBuf::from("/unused"));
        config.apply_to_settings(&mut settings, &config.base_dir().unwrap());

        assert_eq!(settings.data_dir, dir.path().join("data"));
        assert_eq!(settings.downloads_dir, dir.path().join("data/raw_data/url_downloads"));
        assert_eq!(settings.search.query_for("X"), "X climate");
        assert_eq!(settings.search.failure_threshold, 4);
        assert_eq!(settings.search.max_results, 20);
        assert_eq!(settings.download.concurrency, 2);
        assert_eq!(settings.download.paywall_phrases, vec!["subscribe now"]);
        assert_eq!(settings.db_retry.backoff, Duration::from_millis(500));
        assert_eq!(settings.db_retry.max_attempts, 5);
    }

    #[tokio::test]
    async fn loads_yaml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stakeholder.yaml");
        std::fs::write(&path, "cleanup:\n  denylisted_platforms: [youtube]\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(
            config.cleanup.denylisted_platforms,
            Some(vec!["youtube".to_string()])
        );
    }

    #[tokio::test]
    async fn rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stakeholder.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from_path(&path).await.is_err());
    }
}

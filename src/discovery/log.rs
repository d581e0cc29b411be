//! Append-only CSV log of search results.
//!
//! Each line is `organisation,url`, where `url` is either a result URL or a
//! sentinel. The log survives crashes and is the source of truth for which
//! organizations still need searching.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::sentinel;

const HEADER: [&str; 2] = ["organisation", "url"];

fn is_header(first: &str, second: &str) -> bool {
    first.trim().eq_ignore_ascii_case(HEADER[0]) && second.trim().eq_ignore_ascii_case(HEADER[1])
}

#[derive(Debug, Error)]
pub enum SearchLogError {
    #[error("search log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("search log CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to replace search log: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// One row of the search log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLogEntry {
    pub organisation: String,
    pub url: String,
}

impl SearchLogEntry {
    pub fn new(organisation: &str, url: &str) -> Self {
        Self {
            organisation: organisation.to_string(),
            url: url.to_string(),
        }
    }
}

/// Search state of one organization, derived from its log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrgSearchState {
    /// At least one real result or an explicit `no_results`.
    Done,
    /// Only failures so far, below the threshold.
    RetryPending,
    /// Failure budget exhausted; never retried automatically.
    TimedOut,
}

impl OrgSearchState {
    /// Classify one organization's log entries.
    ///
    /// Any non-failure entry wins, even alongside earlier errors.
    pub fn classify(urls: &[String], failure_threshold: usize) -> Self {
        if urls.iter().any(|u| !sentinel::is_failure(u)) {
            return Self::Done;
        }
        let failures = urls
            .iter()
            .filter(|u| matches!(u.as_str(), sentinel::ERROR | sentinel::RATE_LIMITED))
            .count();
        if failures >= failure_threshold || urls.iter().any(|u| u == sentinel::TIMED_OUT) {
            Self::TimedOut
        } else {
            Self::RetryPending
        }
    }

    pub fn needs_search(&self) -> bool {
        matches!(self, Self::RetryPending)
    }
}

/// Handle to the search log file.
#[derive(Debug, Clone)]
pub struct SearchLog {
    path: PathBuf,
}

impl SearchLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append entries and flush before returning.
    ///
    /// A header is written first when the file is new or empty.
    pub fn append(&self, entries: &[SearchLogEntry]) -> Result<(), SearchLogError> {
        if entries.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
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
            writer.write_record(HEADER)?;
        }
        for entry in entries {
            writer.write_record([&entry.organisation, &entry.url])?;
        }
        writer.flush()?;
        let mut file = writer
            .into_inner()
            .map_err(|e| SearchLogError::Io(e.into_error()))?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    /// Read every row in file order. A missing file reads as empty.
    ///
    /// The first row is skipped only if it is the `organisation,url` header,
    /// so hand-made logs without one keep all their rows.
    pub fn entries(&self) -> Result<Vec<SearchLogEntry>, SearchLogError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let mut entries = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let (Some(org), Some(url)) = (record.get(0), record.get(1)) else {
                continue;
            };
            if i == 0 && is_header(org, url) {
                continue;
            }
            entries.push(SearchLogEntry::new(org, url));
        }
        Ok(entries)
    }

    /// Group rows by organization, preserving first-seen order of both
    /// organizations and their URLs.
    pub fn load(&self) -> Result<Vec<(String, Vec<String>)>, SearchLogError> {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for entry in self.entries()? {
            match index.get(&entry.organisation) {
                Some(&i) => grouped[i].1.push(entry.url),
                None => {
                    index.insert(entry.organisation.clone(), grouped.len());
                    grouped.push((entry.organisation, vec![entry.url]));
                }
            }
        }
        Ok(grouped)
    }

    /// Classify every logged organization.
    ///
    /// Timed-out organizations are collapsed to a single `timed_out` row and
    /// the log is rewritten grouped by organization. Organizations absent
    /// from the log are not in the returned map.
    pub fn classify(
        &self,
        failure_threshold: usize,
    ) -> Result<HashMap<String, OrgSearchState>, SearchLogError> {
        let mut grouped = self.load()?;
        let mut states = HashMap::with_capacity(grouped.len());

        for (org, urls) in grouped.iter_mut() {
            let state = OrgSearchState::classify(urls, failure_threshold);
            if state == OrgSearchState::TimedOut && urls.len() > 1 {
                debug!("Collapsing {} failed searches for {}", urls.len(), org);
                *urls = vec![sentinel::TIMED_OUT.to_string()];
            }
            states.insert(org.clone(), state);
        }

        if self.path.exists() {
            self.rewrite(&grouped)?;
        }

        let timed_out = states
            .values()
            .filter(|s| **s == OrgSearchState::TimedOut)
            .count();
        if timed_out > 0 {
            info!("{} organizations timed out in the search log", timed_out);
        }
        Ok(states)
    }

    /// Replace the log with grouped rows via a temp file in the same directory.
    fn rewrite(&self, grouped: &[(String, Vec<String>)]) -> Result<(), SearchLogError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            writer.write_record(HEADER)?;
            for (org, urls) in grouped {
                for url in urls {
                    writer.write_record([org, url])?;
                }
            }
            writer.flush()?;
        }
        tmp.as_file().sync_data()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

//! Ingestion and cleaning: organizations file and search log into the store.

use std::path::Path;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CleanupOptions;
use crate::discovery::{SearchLog, SearchLogError};
use crate::models::NewOrganization;
use crate::repository::{DbContext, DbError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("failed to read organizations file {path}: {source}")]
    Organizations {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    SearchLog(#[from] SearchLogError),
}

/// URLs that are never worth downloading.
#[derive(Debug, Clone)]
pub struct Denylist {
    platforms: Option<Regex>,
    search_results: Option<Regex>,
}

impl Denylist {
    /// Build from cleanup options.
    ///
    /// Platform names match anywhere in the URL, so `linkedin` removes
    /// `https://www.linkedin.com/...` as well as any URL merely mentioning it.
    pub fn from_options(options: &CleanupOptions) -> Result<Self, regex::Error> {
        let names: Vec<String> = options
            .denylisted_platforms
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(regex::escape)
            .collect();
        let platforms = if names.is_empty() {
            None
        } else {
            Some(Regex::new(&names.join("|"))?)
        };

        let pattern = options.search_results_pattern.trim();
        let search_results = if pattern.is_empty() {
            None
        } else {
            Some(Regex::new(pattern)?)
        };

        Ok(Self {
            platforms,
            search_results,
        })
    }

    pub fn is_denied(&self, url: &str) -> bool {
        self.platforms.as_ref().is_some_and(|re| re.is_match(url))
            || self.search_results.as_ref().is_some_and(|re| re.is_match(url))
    }
}

/// Counts from loading the organizations file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationLoadReport {
    pub inserted: usize,
    pub existing: usize,
    pub skipped: usize,
}

/// Counts from ingesting the search log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Rows read from the log.
    pub rows: usize,
    /// New URL records.
    pub added: usize,
    /// Rows already present in the store.
    pub duplicates: usize,
    /// Rows whose organization is not in the store.
    pub unknown_organization: usize,
}

/// Rows deleted by each cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub sentinels: usize,
    pub denylisted: usize,
    pub duplicates: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.sentinels + self.denylisted + self.duplicates
    }
}

/// Moves data from the input files into the store and cleans it.
pub struct IngestService {
    ctx: DbContext,
    denylist: Denylist,
}

impl IngestService {
    pub fn new(ctx: DbContext, denylist: Denylist) -> Self {
        Self { ctx, denylist }
    }

    /// Insert every organization from the organizations CSV.
    ///
    /// Expects the columns `org_title`, `search_title` and `reg_category`.
    /// Rows whose registered title already exists are left alone.
    pub async fn load_organizations(
        &self,
        path: &Path,
    ) -> Result<OrganizationLoadReport, IngestError> {
        let read_error = |source: csv::Error| IngestError::Organizations {
            path: path.display().to_string(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(read_error)?;
        let rows: Vec<NewOrganization> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .map_err(read_error)?;

        let repo = self.ctx.organizations();
        let mut report = OrganizationLoadReport::default();
        for row in rows {
            let org = row.normalized();
            if !org.is_complete() {
                warn!("Skipping incomplete organization row: {:?}", org);
                report.skipped += 1;
                continue;
            }
            if repo.insert_or_ignore(&org).await? {
                report.inserted += 1;
            } else {
                report.existing += 1;
            }
        }

        info!(
            "Organizations: {} inserted, {} already present, {} skipped",
            report.inserted, report.existing, report.skipped
        );
        Ok(report)
    }

    /// Add every (organization, url) row of the search log as a pending URL.
    ///
    /// Safe to re-run: known pairs are counted as duplicates.
    pub async fn ingest_search_log(&self, log: &SearchLog) -> Result<IngestReport, IngestError> {
        let orgs = self.ctx.organizations();
        let urls = self.ctx.urls();
        let mut report = IngestReport::default();

        for entry in log.entries()? {
            report.rows += 1;
            let title = entry.organisation.trim();
            let url = entry.url.trim();
            if url.is_empty() {
                continue;
            }

            let Some(org) = orgs.find_by_search_title(title).await? else {
                debug!("No organization with search title {:?}", title);
                report.unknown_organization += 1;
                continue;
            };

            if urls.add_url(org.id, url).await? {
                report.added += 1;
            } else {
                report.duplicates += 1;
            }
        }

        if report.unknown_organization > 0 {
            warn!(
                "{} search log rows refer to unknown organizations",
                report.unknown_organization
            );
        }
        info!(
            "Ingested search log: {} rows, {} new urls, {} already known",
            report.rows, report.added, report.duplicates
        );
        Ok(report)
    }

    /// Run the three cleanup passes.
    pub async fn clean(&self) -> Result<CleanupReport, IngestError> {
        let urls = self.ctx.urls();
        let report = CleanupReport {
            sentinels: urls.remove_sentinel_urls().await?,
            denylisted: urls.remove_denylisted_urls(&self.denylist).await?,
            duplicates: urls.remove_duplicate_urls().await?,
        };
        info!(
            "Cleanup removed {} placeholders, {} denylisted and {} duplicate urls",
            report.sentinels, report.denylisted, report.duplicates
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SearchLogEntry;

    fn denylist() -> Denylist {
        Denylist::from_options(&CleanupOptions::default()).unwrap()
    }

    #[test]
    fn denylist_matches_platforms_and_search_pages() {
        let list = denylist();
        assert!(list.is_denied("https://www.linkedin.com/company/x"));
        assert!(list.is_denied("https://google.com/search?q=cbam"));
        assert!(list.is_denied("google.com/search?q=y"));
        assert!(list.is_denied("www.google.com/search?q=y"));
        assert!(list.is_denied("https://en.wikipedia.org/wiki/CBAM"));
        assert!(!list.is_denied("https://eurofer.eu/z"));
        assert!(!list.is_denied("https://www.google.com/maps"));
    }

    #[test]
    fn empty_denylist_denies_nothing() {
        let list = Denylist::from_options(&CleanupOptions {
            denylisted_platforms: vec![" ".to_string()],
            search_results_pattern: String::new(),
        })
        .unwrap();
        assert!(!list.is_denied("https://linkedin.com/x"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let result = Denylist::from_options(&CleanupOptions {
            denylisted_platforms: vec![],
            search_results_pattern: "(".to_string(),
        });
        assert!(result.is_err());
    }

    async fn service(dir: &Path) -> IngestService {
        let ctx = DbContext::new(&dir.join("test.db"));
        ctx.init_schema().await.unwrap();
        IngestService::new(ctx, denylist())
    }

    #[tokio::test]
    async fn loads_organizations_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orgs.csv");
        std::fs::write(
            &path,
            "org_title,search_title,reg_category\n\
             Eurofer AISBL , Eurofer,Trade association\n\
             ,Nameless,Other\n",
        )
        .unwrap();
        let svc = service(dir.path()).await;

        let first = svc.load_organizations(&path).await.unwrap();
        assert_eq!(first.inserted, 1);
        assert_eq!(first.skipped, 1);

        let second = svc.load_organizations(&path).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.existing, 1);
        assert_eq!(svc.ctx.organizations().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_organizations_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path()).await;
        let err = svc
            .load_organizations(&dir.path().join("missing.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Organizations { .. }));
    }

    #[tokio::test]
    async fn ingest_skips_unknown_organizations_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path()).await;
        svc.ctx
            .organizations()
            .insert_or_ignore(&NewOrganization {
                registered_title: "Eurofer AISBL".into(),
                search_title: "Eurofer".into(),
                category: "Trade association".into(),
            })
            .await
            .unwrap();

        let log = SearchLog::new(dir.path().join("search.csv"));
        log.append(&[
            SearchLogEntry::new("Eurofer", " https://eurofer.eu/a "),
            SearchLogEntry::new("Eurofer", "no_results"),
            SearchLogEntry::new("Unknown", "https://x.eu"),
        ])
        .unwrap();

        let report = svc.ingest_search_log(&log).await.unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.added, 2);
        assert_eq!(report.unknown_organization, 1);

        let again = svc.ingest_search_log(&log).await.unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.duplicates, 2);

        let cleaned = svc.clean().await.unwrap();
        assert_eq!(cleaned.sentinels, 1);
        assert_eq!(svc.ctx.urls().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clean_removes_denylisted_urls_with_or_without_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path()).await;
        svc.ctx
            .organizations()
            .insert_or_ignore(&NewOrganization {
                registered_title: "Eurofer AISBL".into(),
                search_title: "Eurofer".into(),
                category: "Trade association".into(),
            })
            .await
            .unwrap();

        let log = SearchLog::new(dir.path().join("search.csv"));
        log.append(&[
            SearchLogEntry::new("Eurofer", "linkedin.com/x"),
            SearchLogEntry::new("Eurofer", "google.com/search?q=y"),
            SearchLogEntry::new("Eurofer", "eurofer.eu/z"),
        ])
        .unwrap();
        assert_eq!(svc.ingest_search_log(&log).await.unwrap().added, 3);

        let cleaned = svc.clean().await.unwrap();
        assert_eq!(cleaned.denylisted, 2);

        let left: Vec<String> = svc
            .ctx
            .urls()
            .get_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(left, vec!["eurofer.eu/z".to_string()]);
    }
}

//! Search passes over the organization list.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use super::log::{OrgSearchState, SearchLog, SearchLogEntry, SearchLogError};
use super::{sentinel, SearchProvider};
use crate::config::SearchOptions;
use crate::http_client::random_delay;

/// Outcome of one pass over the organization list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPassReport {
    /// Organizations queried in this pass.
    pub searched: usize,
    /// Queries that returned at least one URL.
    pub with_results: usize,
    /// Queries that returned nothing.
    pub no_results: usize,
    /// Queries that failed.
    pub errors: usize,
    /// URLs appended to the log.
    pub urls_logged: usize,
    /// Organizations skipped because they were already done.
    pub already_done: usize,
    /// Organizations that have exhausted their failure budget (after the pass).
    pub timed_out: usize,
    /// Organizations that still need another pass.
    pub retry_pending: usize,
}

impl SearchPassReport {
    pub fn is_settled(&self) -> bool {
        self.retry_pending == 0
    }
}

/// Runs search passes against a provider, journaling to the search log.
pub struct SearchStage {
    provider: Box<dyn SearchProvider>,
    log: SearchLog,
    options: SearchOptions,
}

impl SearchStage {
    pub fn new(provider: Box<dyn SearchProvider>, log: SearchLog, options: SearchOptions) -> Self {
        Self {
            provider,
            log,
            options,
        }
    }

    /// Query every organization that is neither done nor timed out.
    ///
    /// Organizations never seen in the log are searched. Each result is
    /// appended to the log before the next query starts.
    pub async fn run_pass(
        &self,
        search_titles: &[String],
    ) -> Result<SearchPassReport, SearchLogError> {
        let states = self.log.classify(self.options.failure_threshold)?;
        let mut report = SearchPassReport::default();

        let mut seen = HashSet::new();
        let todo: Vec<&String> = search_titles
            .iter()
            .filter(|t| seen.insert(t.as_str()))
            .filter(|t| match states.get(t.as_str()) {
                Some(OrgSearchState::Done) => {
                    report.already_done += 1;
                    false
                }
                Some(OrgSearchState::TimedOut) => false,
                Some(OrgSearchState::RetryPending) | None => true,
            })
            .collect();

        info!(
            "Search pass: {} organizations to query with {}",
            todo.len(),
            self.provider.name()
        );

        for (i, title) in todo.iter().enumerate() {
            let query = self.options.query_for(title);
            report.searched += 1;

            match self.provider.search(&query, self.options.max_results).await {
                Ok(urls) if urls.is_empty() => {
                    info!("No results for {}", title);
                    self.log
                        .append(&[SearchLogEntry::new(title, sentinel::NO_RESULTS)])?;
                    report.no_results += 1;
                }
                Ok(urls) => {
                    info!("{} results for {}", urls.len(), title);
                    let entries: Vec<SearchLogEntry> =
                        urls.iter().map(|u| SearchLogEntry::new(title, u)).collect();
                    self.log.append(&entries)?;
                    report.with_results += 1;
                    report.urls_logged += entries.len();
                }
                Err(e) => {
                    warn!(
                        "Search failed for {}: {}. Cooling down for {:?}",
                        title, e, self.options.error_cooldown
                    );
                    self.log
                        .append(&[SearchLogEntry::new(title, sentinel::ERROR)])?;
                    report.errors += 1;
                    tokio::time::sleep(self.options.error_cooldown).await;
                }
            }

            if i + 1 < todo.len() {
                tokio::time::sleep(random_delay(self.options.min_delay, self.options.max_delay))
                    .await;
            }
        }

        let after = self.log.classify(self.options.failure_threshold)?;
        let tally = tally_states(search_titles, &after);
        report.timed_out = tally.timed_out;
        report.retry_pending = tally.retry_pending;
        Ok(report)
    }

    /// Repeat passes until no organization is left retryable.
    ///
    /// Terminates because every failed query moves an organization closer
    /// to its failure threshold.
    pub async fn run_until_settled(
        &self,
        search_titles: &[String],
    ) -> Result<Vec<SearchPassReport>, SearchLogError> {
        let mut reports = Vec::new();
        loop {
            let report = self.run_pass(search_titles).await?;
            let settled = report.is_settled();
            reports.push(report);
            if settled {
                info!("All organizations searched");
                return Ok(reports);
            }
            info!(
                "Some organizations are still retryable; next pass in {:?}",
                self.options.pass_interval
            );
            tokio::time::sleep(self.options.pass_interval).await;
        }
    }
}

#[derive(Default)]
struct StateTally {
    timed_out: usize,
    retry_pending: usize,
}

fn tally_states(titles: &[String], states: &HashMap<String, OrgSearchState>) -> StateTally {
    let unique: HashSet<&str> = titles.iter().map(|t| t.as_str()).collect();
    let mut tally = StateTally::default();
    for title in unique {
        match states.get(title) {
            Some(OrgSearchState::TimedOut) => tally.timed_out += 1,
            Some(OrgSearchState::RetryPending) | None => tally.retry_pending += 1,
            Some(OrgSearchState::Done) => {}
        }
    }
    tally
}

//! Document download service.
//!
//! Fetches every pending URL, saves the body under the downloads directory
//! and records the outcome. Separated from UI concerns: progress is
//! reported through `DownloadEvent`s.

mod detect;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::DownloadOptions;
use crate::http_client::{random_delay, HttpClient, UserAgent};
use crate::models::UrlRecord;
use crate::repository::{retry_on_busy, DbContext, DbError, RetryPolicy, UrlRepository};

pub use detect::{classify_file, detect_file_type, detect_paywall};
pub use types::{DownloadEvent, DownloadOutcome, DownloadResult};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to create downloads directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Service for downloading pending URLs.
pub struct DownloadService {
    ctx: DbContext,
    downloads_dir: PathBuf,
    options: DownloadOptions,
    retry: RetryPolicy,
}

/// Everything a fetch task needs, shared across tasks.
struct TaskContext {
    client: HttpClient,
    repo: UrlRepository,
    downloads_dir: PathBuf,
    options: DownloadOptions,
    retry: RetryPolicy,
    event_tx: mpsc::Sender<DownloadEvent>,
}

/// How a task ended.
enum TaskResult {
    Recorded(DownloadOutcome),
    NotPending,
}

impl DownloadService {
    pub fn new(
        ctx: DbContext,
        downloads_dir: PathBuf,
        options: DownloadOptions,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ctx,
            downloads_dir,
            options,
            retry,
        }
    }

    /// Download every pending URL.
    ///
    /// One task per URL is spawned; a semaphore bounds how many fetch at
    /// once. Terminal rows are never fetched again. Returns once every task
    /// has finished.
    pub async fn download(
        &self,
        event_tx: mpsc::Sender<DownloadEvent>,
    ) -> Result<DownloadResult, DownloadError> {
        let repo = self.ctx.urls();
        let pending = repo.get_pending().await?;
        let mut result = DownloadResult::default();
        if pending.is_empty() {
            info!("No pending downloads");
            return Ok(result);
        }

        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        let client = HttpClient::new(
            self.options.request_timeout,
            &UserAgent::from_setting(self.options.user_agent.as_deref()),
        )?;

        info!(
            "Downloading {} urls with concurrency {}",
            pending.len(),
            self.options.concurrency
        );

        let shared = Arc::new(TaskContext {
            client,
            repo,
            downloads_dir: self.downloads_dir.clone(),
            options: self.options.clone(),
            retry: self.retry.clone(),
            event_tx,
        });
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for record in pending {
            let shared = shared.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Ok(TaskResult::NotPending);
                };
                process_url(&shared, record).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(TaskResult::Recorded(outcome))) if outcome.is_success() => {
                    result.succeeded += 1
                }
                Ok(Ok(TaskResult::Recorded(_))) => result.failed += 1,
                Ok(Ok(TaskResult::NotPending)) => result.skipped += 1,
                Ok(Err(e)) => {
                    error!("Failed to record download outcome: {}", e);
                    result.failed += 1;
                }
                Err(e) => {
                    error!("Download task panicked: {}", e);
                    result.failed += 1;
                }
            }
        }

        info!(
            "Downloads finished: {} succeeded, {} failed, {} skipped",
            result.succeeded, result.failed, result.skipped
        );
        Ok(result)
    }
}

/// Fetch one URL, record the outcome, then pause before releasing the permit.
async fn process_url(shared: &TaskContext, record: UrlRecord) -> Result<TaskResult, DbError> {
    let _ = shared
        .event_tx
        .send(DownloadEvent::Started {
            url_id: record.id,
            url: record.url.clone(),
        })
        .await;

    let path = shared.downloads_dir.join(&record.file_path);
    let outcome = fetch(&shared.client, &record.url, &path, &shared.options).await;

    let status = outcome.status();
    let (file_type, paywall) = outcome.classification();
    let recorded = retry_on_busy(&shared.retry, || {
        shared
            .repo
            .mark_download(record.id, status, Some(file_type), Some(paywall))
    })
    .await;

    let event = match &outcome {
        DownloadOutcome::Downloaded {
            file_type,
            paywall,
            bytes,
        } => DownloadEvent::Completed {
            url_id: record.id,
            url: record.url.clone(),
            file_type: *file_type,
            paywall: *paywall,
            bytes: *bytes,
        },
        DownloadOutcome::HttpRejected(code) => DownloadEvent::Failed {
            url_id: record.id,
            url: record.url.clone(),
            status,
            error: format!("HTTP {}", code),
        },
        DownloadOutcome::Failed(error) => DownloadEvent::Failed {
            url_id: record.id,
            url: record.url.clone(),
            status,
            error: error.clone(),
        },
    };
    let _ = shared.event_tx.send(event).await;

    let delay = random_delay(shared.options.min_delay, shared.options.max_delay);
    tokio::time::sleep(delay).await;

    if recorded? {
        Ok(TaskResult::Recorded(outcome))
    } else {
        warn!("url {} was no longer pending; outcome not recorded", record.id);
        Ok(TaskResult::NotPending)
    }
}

async fn fetch(
    client: &HttpClient,
    url: &str,
    path: &Path,
    options: &DownloadOptions,
) -> DownloadOutcome {
    let response = match client.get(url).await {
        Ok(r) => r,
        Err(e) => {
            debug!("Failed to fetch {}: {}", url, e);
            return DownloadOutcome::Failed(e.to_string());
        }
    };

    let code = response.status.as_u16();
    if matches!(code, 403 | 404) {
        debug!("{} answered {}", url, code);
        return DownloadOutcome::HttpRejected(code);
    }
    if !response.is_success() {
        return DownloadOutcome::Failed(format!("HTTP {}", response.status));
    }

    let content = match response.bytes().await {
        Ok(b) => b,
        Err(e) => return DownloadOutcome::Failed(e.to_string()),
    };
    if let Err(e) = tokio::fs::write(path, &content).await {
        return DownloadOutcome::Failed(format!("failed to write {}: {}", path.display(), e));
    }

    let (file_type, paywall) =
        classify_file(path, &options.paywall_phrases, options.min_page_chars).await;
    DownloadOutcome::Downloaded {
        file_type,
        paywall,
        bytes: content.len() as u64,
    }
}

//! Candidate URL repository: insertion, download state and cleanup passes.

use std::collections::BTreeMap;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::{debug, warn};

use super::models::{StatusCount, UrlRow};
use super::pool::{DbError, DbPool};
use crate::discovery::sentinel;
use crate::models::{now_timestamp, DownloadStatus, FileType, PaywallStatus, UrlRecord};
use crate::schema::urls;
use crate::services::ingest::Denylist;
use crate::with_conn;

/// Deletes are issued in chunks to stay under SQLite's bound parameter limit.
const DELETE_CHUNK: usize = 500;

#[derive(Clone)]
pub struct UrlRepository {
    pool: DbPool,
}

impl UrlRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a candidate URL for an organization.
    ///
    /// Returns `false` if the (organization, url) pair is already known.
    /// New rows start `pending` with `file_path = "{organization_id}_{id}"`;
    /// the insert and the file path assignment commit together.
    pub async fn add_url(&self, organization_id: i32, url: &str) -> Result<bool, DbError> {
        use diesel::dsl::count_star;
        use diesel_async::AsyncConnection;

        let url = url.to_string();
        with_conn!(self.pool, conn => {
            conn.transaction(|conn| {
                let url = url.clone();
                Box::pin(async move {
                    let exists: i64 = urls::table
                        .filter(urls::organization_id.eq(organization_id))
                        .filter(urls::url.eq(&url))
                        .select(count_star())
                        .first(conn)
                        .await?;

                    if exists > 0 {
                        return Ok(false);
                    }

                    diesel::insert_into(urls::table)
                        .values((
                            urls::organization_id.eq(organization_id),
                            urls::url.eq(&url),
                            urls::download_status.eq(DownloadStatus::Pending.as_str()),
                        ))
                        .execute(conn)
                        .await?;

                    let id: i32 = urls::table
                        .filter(urls::organization_id.eq(organization_id))
                        .filter(urls::url.eq(&url))
                        .order(urls::id.desc())
                        .select(urls::id)
                        .first(conn)
                        .await?;

                    diesel::update(urls::table.find(id))
                        .set(urls::file_path.eq(UrlRecord::file_name_for(organization_id, id)))
                        .execute(conn)
                        .await?;

                    Ok(true)
                })
            })
            .await
        })
    }

    /// Get a URL row by id.
    pub async fn get(&self, id: i32) -> Result<Option<UrlRecord>, DbError> {
        with_conn!(self.pool, conn => {
            urls::table
                .find(id)
                .select(UrlRow::as_select())
                .first(&mut conn)
                .await
                .optional()
                .map(|r| r.map(UrlRecord::from))
        })
    }

    /// All rows still waiting for a download attempt, in insertion order.
    pub async fn get_pending(&self) -> Result<Vec<UrlRecord>, DbError> {
        with_conn!(self.pool, conn => {
            urls::table
                .filter(urls::download_status.eq(DownloadStatus::Pending.as_str()))
                .order(urls::id.asc())
                .select(UrlRow::as_select())
                .load(&mut conn)
                .await
                .map(|rows| rows.into_iter().map(UrlRecord::from).collect())
        })
    }

    /// Record the outcome of a download attempt.
    ///
    /// Only rows that are still `pending` are updated, so terminal states are
    /// never overwritten. Returns whether a row changed.
    pub async fn mark_download(
        &self,
        id: i32,
        status: DownloadStatus,
        file_type: Option<FileType>,
        paywall: Option<PaywallStatus>,
    ) -> Result<bool, DbError> {
        if !DownloadStatus::Pending.can_transition_to(status) {
            warn!("Refusing to mark url {} as {}", id, status);
            return Ok(false);
        }

        let status = status.as_str();
        let file_type = file_type.map(|t| t.as_str());
        let paywall = paywall.map(|p| p.as_str());
        let now = now_timestamp();

        with_conn!(self.pool, conn => {
            let updated = diesel::update(
                urls::table
                    .filter(urls::id.eq(id))
                    .filter(urls::download_status.eq(DownloadStatus::Pending.as_str())),
            )
            .set((
                urls::download_status.eq(&status),
                urls::file_type.eq(file_type),
                urls::paywall_status.eq(paywall),
                urls::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;
            Ok(updated > 0)
        })
    }

    /// Delete search-log placeholder rows (`no_results`, `error`, ...).
    pub async fn remove_sentinel_urls(&self) -> Result<usize, DbError> {
        with_conn!(self.pool, conn => {
            diesel::delete(urls::table.filter(urls::url.eq_any(sentinel::ALL)))
                .execute(&mut conn)
                .await
        })
    }

    /// Delete rows whose URL matches the denylist.
    pub async fn remove_denylisted_urls(&self, denylist: &Denylist) -> Result<usize, DbError> {
        with_conn!(self.pool, conn => {
            let rows: Vec<(i32, String)> = urls::table
                .select((urls::id, urls::url))
                .load(&mut conn)
                .await?;

            let ids: Vec<i32> = rows
                .into_iter()
                .filter(|(_, url)| denylist.is_denied(url))
                .map(|(id, _)| id)
                .collect();

            let mut deleted = 0;
            for chunk in ids.chunks(DELETE_CHUNK) {
                deleted += diesel::delete(urls::table.filter(urls::id.eq_any(chunk)))
                    .execute(&mut conn)
                    .await?;
            }
            debug!("Removed {} denylisted urls", deleted);
            Ok(deleted)
        })
    }

    /// Delete repeated (organization, url) pairs, keeping the earliest row.
    ///
    /// The same URL under different organizations is kept.
    pub async fn remove_duplicate_urls(&self) -> Result<usize, DbError> {
        with_conn!(self.pool, conn => {
            diesel::sql_query(
                "DELETE FROM urls WHERE id NOT IN \
                 (SELECT MIN(id) FROM urls GROUP BY organization_id, url)",
            )
            .execute(&mut conn)
            .await
        })
    }

    /// Move failed rows back to `pending` so the next download run retries them.
    ///
    /// With `Some(status)` only rows in that failure state are reset; with
    /// `None` every failure state is. Non-failure statuses are rejected.
    pub async fn reset_downloads(&self, status: Option<DownloadStatus>) -> Result<usize, DbError> {
        if let Some(status) = status {
            if !status.is_failure() {
                warn!("Only failed downloads can be reset, not {}", status);
                return Ok(0);
            }
        }

        let now = now_timestamp();
        let pending = DownloadStatus::Pending.as_str();
        let no_text: Option<&str> = None;

        with_conn!(self.pool, conn => {
            match status {
                Some(status) => {
                    diesel::update(urls::table.filter(urls::download_status.eq(status.as_str())))
                        .set((
                            urls::download_status.eq(&pending),
                            urls::file_type.eq(no_text),
                            urls::paywall_status.eq(no_text),
                            urls::updated_at.eq(&now),
                        ))
                        .execute(&mut conn)
                        .await
                }
                None => {
                    diesel::update(urls::table.filter(urls::download_status.like("failure%")))
                        .set((
                            urls::download_status.eq(&pending),
                            urls::file_type.eq(no_text),
                            urls::paywall_status.eq(no_text),
                            urls::updated_at.eq(&now),
                        ))
                        .execute(&mut conn)
                        .await
                }
            }
        })
    }

    /// Row counts per download status.
    pub async fn status_counts(&self) -> Result<BTreeMap<String, u64>, DbError> {
        with_conn!(self.pool, conn => {
            let counts: Vec<StatusCount> = diesel::sql_query(
                "SELECT download_status AS status, COUNT(*) AS count FROM urls GROUP BY download_status",
            )
            .load(&mut conn)
            .await?;

            Ok(counts
                .into_iter()
                .map(|sc| (sc.status, sc.count as u64))
                .collect())
        })
    }

    pub async fn count(&self) -> Result<u64, DbError> {
        use diesel::dsl::count_star;
        with_conn!(self.pool, conn => {
            let count: i64 = urls::table.select(count_star()).first(&mut conn).await?;
            Ok(count as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewOrganization;
    use crate::repository::DbContext;

    async fn setup() -> (tempfile::TempDir, DbContext, i32) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        ctx.organizations()
            .insert_or_ignore(&NewOrganization {
                registered_title: "Eurofer AISBL".to_string(),
                search_title: "Eurofer".to_string(),
                category: String::new(),
            })
            .await
            .unwrap();
        let org_id = ctx
            .organizations()
            .find_by_search_title("Eurofer")
            .await
            .unwrap()
            .unwrap()
            .id;
        (dir, ctx, org_id)
    }

    #[tokio::test]
    async fn add_url_assigns_file_path_and_is_idempotent() {
        let (_dir, ctx, org_id) = setup().await;
        let repo = ctx.urls();

        assert!(repo.add_url(org_id, "https://eurofer.eu/a.pdf").await.unwrap());
        assert!(!repo.add_url(org_id, "https://eurofer.eu/a.pdf").await.unwrap());

        let pending = repo.get_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        let record = &pending[0];
        assert_eq!(record.file_path, format!("{}_{}", org_id, record.id));
        assert_eq!(record.download_status, DownloadStatus::Pending);
    }

    #[tokio::test]
    async fn every_added_row_has_a_file_path() {
        let (_dir, ctx, org_id) = setup().await;
        let repo = ctx.urls();
        for i in 0..20 {
            repo.add_url(org_id, &format!("https://eurofer.eu/{}", i))
                .await
                .unwrap();
        }

        let pending = repo.get_pending().await.unwrap();
        assert_eq!(pending.len(), 20);
        for record in &pending {
            assert_eq!(record.file_path, format!("{}_{}", org_id, record.id));
        }
    }

    #[tokio::test]
    async fn schema_init_repairs_rows_without_file_path() {
        let (dir, ctx, org_id) = setup().await;
        let repo = ctx.urls();
        repo.add_url(org_id, "https://eurofer.eu/a.pdf").await.unwrap();
        let id = repo.get_pending().await.unwrap()[0].id;

        // A row written before its file path was assigned.
        {
            let pool = DbPool::from_path(&dir.path().join("test.db"));
            let mut conn = pool.get().await.unwrap();
            diesel::update(urls::table.find(id))
                .set(urls::file_path.eq(""))
                .execute(&mut conn)
                .await
                .unwrap();
        }
        assert_eq!(repo.get(id).await.unwrap().unwrap().file_path, "");

        ctx.init_schema().await.unwrap();
        assert_eq!(
            repo.get(id).await.unwrap().unwrap().file_path,
            format!("{}_{}", org_id, id)
        );
    }

    #[tokio::test]
    async fn add_url_rejects_unknown_organization() {
        let (_dir, ctx, _org_id) = setup().await;
        assert!(ctx.urls().add_url(9999, "https://example.org").await.is_err());
    }

    #[tokio::test]
    async fn mark_download_only_moves_pending_rows() {
        let (_dir, ctx, org_id) = setup().await;
        let repo = ctx.urls();
        repo.add_url(org_id, "https://eurofer.eu/a.pdf").await.unwrap();
        let id = repo.get_pending().await.unwrap()[0].id;

        assert!(repo
            .mark_download(id, DownloadStatus::Success, Some(FileType::Pdf), None)
            .await
            .unwrap());
        assert!(!repo
            .mark_download(id, DownloadStatus::Failure, None, None)
            .await
            .unwrap());

        let record = repo.get(id).await.unwrap().unwrap();
        assert_eq!(record.download_status, DownloadStatus::Success);
        assert_eq!(record.file_type, Some(FileType::Pdf));
        assert!(record.updated_at.is_some());
        assert!(repo.get_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_passes_are_idempotent() {
        let (_dir, ctx, org_id) = setup().await;
        let repo = ctx.urls();
        for url in ["no_results", "error", "https://eurofer.eu/z"] {
            repo.add_url(org_id, url).await.unwrap();
        }

        assert_eq!(repo.remove_sentinel_urls().await.unwrap(), 2);
        assert_eq!(repo.remove_sentinel_urls().await.unwrap(), 0);
        assert_eq!(repo.remove_duplicate_urls().await.unwrap(), 0);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reset_only_touches_failures() {
        let (_dir, ctx, org_id) = setup().await;
        let repo = ctx.urls();
        for url in ["https://a.eu/1", "https://a.eu/2", "https://a.eu/3"] {
            repo.add_url(org_id, url).await.unwrap();
        }
        let ids: Vec<i32> = repo.get_pending().await.unwrap().iter().map(|r| r.id).collect();
        repo.mark_download(ids[0], DownloadStatus::Success, Some(FileType::Html), None)
            .await
            .unwrap();
        repo.mark_download(ids[1], DownloadStatus::FailureHttp(404), None, None)
            .await
            .unwrap();
        repo.mark_download(ids[2], DownloadStatus::Failure, None, None)
            .await
            .unwrap();

        assert_eq!(repo.reset_downloads(Some(DownloadStatus::Success)).await.unwrap(), 0);
        assert_eq!(
            repo.reset_downloads(Some(DownloadStatus::FailureHttp(404)))
                .await
                .unwrap(),
            1
        );
        assert_eq!(repo.reset_downloads(None).await.unwrap(), 1);

        let counts = repo.status_counts().await.unwrap();
        assert_eq!(counts.get("pending"), Some(&2));
        assert_eq!(counts.get("success"), Some(&1));
    }
}

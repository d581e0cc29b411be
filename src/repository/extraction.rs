//! Extraction record repository, shared by the HTML and PDF sub-pipelines.

use std::collections::BTreeMap;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;

use super::models::{ExtractionRow, StatusCount};
use super::pool::{DbError, DbPool};
use crate::models::{now_timestamp, ExtractStatus, ExtractionKind, ExtractionRecord};
use crate::schema::{html_text, pdf_text};
use crate::with_conn;

impl ExtractionKind {
    fn table_name(&self) -> &'static str {
        match self {
            Self::Html => "html_text",
            Self::Pdf => "pdf_text",
        }
    }

    fn source_column(&self) -> &'static str {
        match self {
            Self::Html => "html_file",
            Self::Pdf => "pdf_file",
        }
    }

    /// Filter on `urls` selecting downloads this sub-pipeline handles.
    fn eligibility(&self) -> &'static str {
        match self {
            Self::Html => {
                "download_status = 'success' AND file_type = 'html' AND paywall_status = 'unknown'"
            }
            Self::Pdf => "download_status = 'success' AND file_type = 'pdf'",
        }
    }
}

#[derive(Clone)]
pub struct ExtractionRepository {
    pool: DbPool,
    kind: ExtractionKind,
}

impl ExtractionRepository {
    pub fn new(pool: DbPool, kind: ExtractionKind) -> Self {
        Self { pool, kind }
    }

    pub fn kind(&self) -> ExtractionKind {
        self.kind
    }

    /// Create `pending` records for every eligible download not yet tracked.
    ///
    /// Existing records are left alone, so repeated promotion never resets
    /// progress. Returns the number of records created.
    pub async fn promote_eligible(&self) -> Result<usize, DbError> {
        let sql = format!(
            "INSERT OR IGNORE INTO {table} (id, organization_id, {source}, extract_status, updated_at) \
             SELECT id, organization_id, file_path, 'pending', ? FROM urls WHERE {filter} ORDER BY id",
            table = self.kind.table_name(),
            source = self.kind.source_column(),
            filter = self.kind.eligibility(),
        );
        let now = now_timestamp();

        with_conn!(self.pool, conn => {
            diesel::sql_query(sql)
                .bind::<diesel::sql_types::Text, _>(&now)
                .execute(&mut conn)
                .await
        })
    }

    /// Records waiting for extraction, in id order.
    pub async fn get_pending(&self) -> Result<Vec<ExtractionRecord>, DbError> {
        let pending = ExtractStatus::Pending.as_str();
        let kind = self.kind;

        let rows: Vec<ExtractionRow> = with_conn!(self.pool, conn => {
            match kind {
                ExtractionKind::Html => {
                    html_text::table
                        .filter(html_text::extract_status.eq(pending))
                        .order(html_text::id.asc())
                        .load::<ExtractionRow>(&mut conn)
                        .await?
                }
                ExtractionKind::Pdf => {
                    pdf_text::table
                        .filter(pdf_text::extract_status.eq(pending))
                        .order(pdf_text::id.asc())
                        .load::<ExtractionRow>(&mut conn)
                        .await?
                }
            }
        });

        Ok(rows.into_iter().map(|r| r.into_record(kind)).collect())
    }

    /// Get one record by id.
    pub async fn get(&self, id: i32) -> Result<Option<ExtractionRecord>, DbError> {
        let kind = self.kind;
        let row: Option<ExtractionRow> = with_conn!(self.pool, conn => {
            match kind {
                ExtractionKind::Html => html_text::table
                    .find(id)
                    .first::<ExtractionRow>(&mut conn)
                    .await
                    .optional()?,
                ExtractionKind::Pdf => pdf_text::table
                    .find(id)
                    .first::<ExtractionRow>(&mut conn)
                    .await
                    .optional()?,
            }
        });
        Ok(row.map(|r| r.into_record(kind)))
    }

    /// Move a `pending` record to a terminal status.
    ///
    /// Returns whether a row changed; records in a terminal status are never
    /// overwritten.
    pub async fn mark(
        &self,
        id: i32,
        status: ExtractStatus,
        extracted_text_path: Option<&str>,
    ) -> Result<bool, DbError> {
        if !ExtractStatus::Pending.can_transition_to(status) {
            warn!("Refusing to mark {} record {} as {}", self.kind, id, status.as_str());
            return Ok(false);
        }

        let pending = ExtractStatus::Pending.as_str();
        let status = status.as_str();
        let now = now_timestamp();

        with_conn!(self.pool, conn => {
            let updated = match self.kind {
                ExtractionKind::Html => {
                    diesel::update(
                        html_text::table
                            .filter(html_text::id.eq(id))
                            .filter(html_text::extract_status.eq(pending)),
                    )
                    .set((
                        html_text::extract_status.eq(status),
                        html_text::extracted_text_path.eq(extracted_text_path),
                        html_text::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?
                }
                ExtractionKind::Pdf => {
                    diesel::update(
                        pdf_text::table
                            .filter(pdf_text::id.eq(id))
                            .filter(pdf_text::extract_status.eq(pending)),
                    )
                    .set((
                        pdf_text::extract_status.eq(status),
                        pdf_text::extracted_text_path.eq(extracted_text_path),
                        pdf_text::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?
                }
            };
            Ok(updated > 0)
        })
    }

    /// Return `failure` records to `pending`. Encrypted PDFs stay put.
    pub async fn reset_failed(&self) -> Result<usize, DbError> {
        let sql = format!(
            "UPDATE {} SET extract_status = 'pending', extracted_text_path = NULL, updated_at = ? \
             WHERE extract_status = 'failure'",
            self.kind.table_name()
        );
        let now = now_timestamp();

        with_conn!(self.pool, conn => {
            diesel::sql_query(sql)
                .bind::<diesel::sql_types::Text, _>(&now)
                .execute(&mut conn)
                .await
        })
    }

    /// Record counts per extraction status.
    pub async fn status_counts(&self) -> Result<BTreeMap<String, u64>, DbError> {
        let sql = format!(
            "SELECT extract_status AS status, COUNT(*) AS count FROM {} GROUP BY extract_status",
            self.kind.table_name()
        );

        with_conn!(self.pool, conn => {
            let counts: Vec<StatusCount> = diesel::sql_query(sql).load(&mut conn).await?;
            Ok(counts
                .into_iter()
                .map(|sc| (sc.status, sc.count as u64))
                .collect())
        })
    }
}

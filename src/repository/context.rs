//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection factory and hands out repositories.

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::extraction::ExtractionRepository;
use super::organization::OrganizationRepository;
use super::pool::{DbError, DbPool};
use super::url::UrlRepository;
use crate::models::ExtractionKind;
use crate::with_conn;

/// Database context that manages the connection factory and provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::new(&settings.database_path());
/// ctx.init_schema().await?;
/// let pending = ctx.urls().get_pending().await?;
/// ```
#[derive(Clone, Debug)]
pub struct DbContext {
    pool: DbPool,
}

impl DbContext {
    /// Create a context from a database file path.
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: DbPool::from_path(db_path),
        }
    }

    pub fn organizations(&self) -> OrganizationRepository {
        OrganizationRepository::new(self.pool.clone())
    }

    pub fn urls(&self) -> UrlRepository {
        UrlRepository::new(self.pool.clone())
    }

    /// Get the extraction repository for one sub-pipeline.
    pub fn extractions(&self, kind: ExtractionKind) -> ExtractionRepository {
        ExtractionRepository::new(self.pool.clone(), kind)
    }

    /// Create the four tables and their indexes if absent, and give any
    /// url row missing its file path the `{organization_id}_{id}` name.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        with_conn!(self.pool, conn => {
            conn.batch_execute(include_str!("schema_sqlite.sql")).await
        })
    }
}

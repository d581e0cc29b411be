//! Repository utilities.

use std::future::Future;
use std::time::Duration;

use diesel::result::DatabaseErrorInformation;
use tracing::warn;

use super::pool::DbError;

/// Simple error info wrapper for database errors.
#[derive(Debug)]
pub struct DbErrorInfo(pub String);

impl DatabaseErrorInformation for DbErrorInfo {
    fn message(&self) -> &str {
        &self.0
    }
    fn details(&self) -> Option<&str> {
        None
    }
    fn hint(&self) -> Option<&str> {
        None
    }
    fn table_name(&self) -> Option<&str> {
        None
    }
    fn column_name(&self) -> Option<&str> {
        None
    }
    fn constraint_name(&self) -> Option<&str> {
        None
    }
    fn statement_position(&self) -> Option<i32> {
        None
    }
}

/// Convert any displayable error to a diesel error with proper message.
pub fn to_diesel_error(e: impl std::fmt::Display) -> DbError {
    diesel::result::Error::DatabaseError(
        diesel::result::DatabaseErrorKind::Unknown,
        Box::new(DbErrorInfo(e.to_string())),
    )
}

/// Whether SQLite rejected the statement because another connection holds
/// the write lock.
pub fn is_busy(e: &DbError) -> bool {
    match e {
        diesel::result::Error::DatabaseError(_, info) => {
            let msg = info.message().to_ascii_lowercase();
            msg.contains("database is locked") || msg.contains("database is busy")
        }
        _ => false,
    }
}

/// Fixed-backoff retry for writes that hit a locked database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Sleep between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(20),
        }
    }
}

/// Run `op`, retrying while SQLite reports the database as busy.
///
/// Any other error is returned immediately. A busy error is returned only
/// after `policy.max_attempts` attempts.
pub async fn retry_on_busy<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if is_busy(&e) && attempt < attempts => {
                warn!(
                    "Database busy (attempt {}/{}), retrying in {:?}",
                    attempt, attempts, policy.backoff
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM over SQLite, driven asynchronously
//! through diesel-async's `SyncConnectionWrapper`.

pub mod context;
pub mod extraction;
pub mod models;
pub mod organization;
pub mod pool;
pub mod url;
pub mod util;

pub use context::DbContext;
pub use extraction::ExtractionRepository;
pub use organization::OrganizationRepository;
pub use pool::{DbError, DbPool};
pub use url::UrlRepository;
pub use util::{is_busy, retry_on_busy, RetryPolicy};

//! Data models for the acquisition pipeline.

mod extraction;
mod organization;
mod url_record;

pub use extraction::{ExtractStatus, ExtractionKind, ExtractionRecord};
pub use organization::{NewOrganization, Organization};
pub use url_record::{DownloadStatus, FileType, PaywallStatus, UrlRecord};

/// Current time formatted the way status timestamps are stored.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

//! Download service types and events.

use crate::models::{DownloadStatus, FileType, PaywallStatus};

/// Events emitted during download operations.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// The fetch for a URL started.
    Started { url_id: i32, url: String },
    /// The file was saved and classified.
    Completed {
        url_id: i32,
        url: String,
        file_type: FileType,
        paywall: PaywallStatus,
        bytes: u64,
    },
    /// The fetch failed; the row is now in a failure state.
    Failed {
        url_id: i32,
        url: String,
        status: DownloadStatus,
        error: String,
    },
}

/// What happened to one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Saved to disk.
    Downloaded {
        file_type: FileType,
        paywall: PaywallStatus,
        bytes: u64,
    },
    /// The server answered 403 or 404.
    HttpRejected(u16),
    /// Any other HTTP error status, a transport error or a local write error.
    Failed(String),
}

impl DownloadOutcome {
    /// Status recorded for this outcome.
    pub fn status(&self) -> DownloadStatus {
        match self {
            Self::Downloaded { .. } => DownloadStatus::Success,
            Self::HttpRejected(code) => DownloadStatus::FailureHttp(*code),
            Self::Failed(_) => DownloadStatus::Failure,
        }
    }

    /// File type and paywall columns recorded for this outcome.
    pub fn classification(&self) -> (FileType, PaywallStatus) {
        match self {
            Self::Downloaded {
                file_type, paywall, ..
            } => (*file_type, *paywall),
            _ => (FileType::Unknown, PaywallStatus::Unknown),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Downloaded { .. })
    }
}

/// Result of a download run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadResult {
    pub succeeded: usize,
    pub failed: usize,
    /// Rows that were no longer pending when the outcome was recorded.
    pub skipped: usize,
}

impl DownloadResult {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_maps_to_status() {
        assert_eq!(
            DownloadOutcome::HttpRejected(403).status(),
            DownloadStatus::FailureHttp(403)
        );
        assert_eq!(
            DownloadOutcome::Failed("timeout".into()).status(),
            DownloadStatus::Failure
        );
        let ok = DownloadOutcome::Downloaded {
            file_type: FileType::Pdf,
            paywall: PaywallStatus::Unknown,
            bytes: 10,
        };
        assert_eq!(ok.status(), DownloadStatus::Success);
        assert_eq!(ok.classification(), (FileType::Pdf, PaywallStatus::Unknown));
    }
}

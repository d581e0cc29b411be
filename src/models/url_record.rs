//! Candidate URL models and the download state machine.

use serde::{Deserialize, Serialize};

/// Download state of a candidate URL.
///
/// ```text
/// pending -> success | failure | failure_<http code>
/// ```
///
/// Terminal states go back to `pending` only through an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadStatus {
    Pending,
    Success,
    /// Transport error or an HTTP error status other than 403/404.
    Failure,
    /// The server answered 403 or 404.
    FailureHttp(u16),
}

impl DownloadStatus {
    pub fn as_str(&self) -> String {
        match self {
            Self::Pending => "pending".to_string(),
            Self::Success => "success".to_string(),
            Self::Failure => "failure".to_string(),
            Self::FailureHttp(code) => format!("failure_{}", code),
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => s
                .strip_prefix("failure_")
                .and_then(|code| code.parse().ok())
                .map(Self::FailureHttp),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure | Self::FailureHttp(_))
    }

    /// Whether the download stage may move a record from `self` to `next`.
    pub fn can_transition_to(&self, next: DownloadStatus) -> bool {
        matches!(self, Self::Pending) && next.is_terminal()
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// File type decided by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    Pdf,
    Html,
    Unknown,
    Unreadable,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::Unknown => "unknown",
            Self::Unreadable => "unreadable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "html" => Some(Self::Html),
            "unknown" => Some(Self::Unknown),
            "unreadable" => Some(Self::Unreadable),
            _ => None,
        }
    }
}

/// Result of the paywall heuristic on a downloaded HTML page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaywallStatus {
    /// No indicator found, or the file was not checked.
    Unknown,
    /// The page is suspiciously short.
    Possible,
    /// The page contains a configured paywall phrase.
    Detected,
    Unreadable,
}

impl PaywallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Possible => "possible paywall",
            Self::Detected => "paywall detected",
            Self::Unreadable => "unreadable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(Self::Unknown),
            "possible paywall" => Some(Self::Possible),
            "paywall detected" => Some(Self::Detected),
            "unreadable" => Some(Self::Unreadable),
            _ => None,
        }
    }
}

/// A candidate document URL found for one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub id: i32,
    pub organization_id: i32,
    pub url: String,
    /// File name under the downloads directory, `{organization_id}_{id}`.
    pub file_path: String,
    pub download_status: DownloadStatus,
    pub file_type: Option<FileType>,
    pub paywall_status: Option<PaywallStatus>,
    /// When the status last changed.
    pub updated_at: Option<String>,
}

impl UrlRecord {
    /// Local file name for a URL row.
    pub fn file_name_for(organization_id: i32, url_id: i32) -> String {
        format!("{}_{}", organization_id, url_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_status_round_trips_http_codes() {
        assert_eq!(
            DownloadStatus::from_str("failure_404"),
            Some(DownloadStatus::FailureHttp(404))
        );
        assert_eq!(DownloadStatus::FailureHttp(403).as_str(), "failure_403");
        assert_eq!(DownloadStatus::from_str("failure_abc"), None);
        assert_eq!(DownloadStatus::from_str("done"), None);
    }

    #[test]
    fn only_pending_moves_forward() {
        let pending = DownloadStatus::Pending;
        assert!(pending.can_transition_to(DownloadStatus::Success));
        assert!(pending.can_transition_to(DownloadStatus::FailureHttp(404)));
        assert!(!pending.can_transition_to(DownloadStatus::Pending));
        assert!(!DownloadStatus::Failure.can_transition_to(DownloadStatus::Success));
        assert!(!DownloadStatus::Success.can_transition_to(DownloadStatus::Failure));
    }

    #[test]
    fn paywall_labels_match_stored_values() {
        assert_eq!(PaywallStatus::Possible.as_str(), "possible paywall");
        assert_eq!(
            PaywallStatus::from_str("paywall detected"),
            Some(PaywallStatus::Detected)
        );
    }

    #[test]
    fn file_name_joins_ids() {
        assert_eq!(UrlRecord::file_name_for(12, 345), "12_345");
    }
}

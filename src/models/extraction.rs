//! Text extraction records.

use serde::{Deserialize, Serialize};

/// Which extraction sub-pipeline a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractionKind {
    Html,
    Pdf,
}

impl ExtractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extraction state of one downloaded file.
///
/// ```text
/// pending -> success | failure | encrypted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractStatus {
    Pending,
    Success,
    Failure,
    /// Encrypted PDF; never retried automatically.
    Encrypted,
}

impl ExtractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Encrypted => "encrypted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "encrypted" => Some(Self::Encrypted),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: ExtractStatus) -> bool {
        matches!(self, Self::Pending) && next != Self::Pending
    }
}

/// A row of `html_text` or `pdf_text`.
///
/// The id is shared with the originating `urls` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub id: i32,
    pub kind: ExtractionKind,
    pub organization_id: i32,
    /// Downloaded file name under the downloads directory.
    pub source_file: String,
    pub extracted_text_path: Option<String>,
    pub status: ExtractStatus,
    pub updated_at: Option<String>,
}

impl ExtractionRecord {
    /// Artifact file name, `{organization_id}_{id}.json`.
    pub fn artifact_name(&self) -> String {
        format!("{}_{}.json", self.organization_id, self.id)
    }
}

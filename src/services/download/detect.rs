//! Content sniffing and the paywall heuristic.

use std::path::Path;

use tracing::warn;

use crate::models::{FileType, PaywallStatus};

/// Bytes inspected when sniffing the file type.
const SNIFF_LEN: usize = 1024;

/// Classify content by its first kilobyte.
pub fn detect_file_type(content: &[u8]) -> FileType {
    let header = &content[..content.len().min(SNIFF_LEN)];
    if header.starts_with(b"%PDF-") {
        return FileType::Pdf;
    }
    let lower = header.to_ascii_lowercase();
    if contains(&lower, b"<html") || contains(&lower, b"<!doctype html") {
        FileType::Html
    } else {
        FileType::Unknown
    }
}

/// Flag short pages and pages containing a paywall phrase.
///
/// `phrases` are matched case-insensitively against the whole page.
pub fn detect_paywall(text: &str, phrases: &[String], min_chars: usize) -> PaywallStatus {
    if text.chars().count() < min_chars {
        return PaywallStatus::Possible;
    }
    let lower = text.to_lowercase();
    if phrases
        .iter()
        .any(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
    {
        PaywallStatus::Detected
    } else {
        PaywallStatus::Unknown
    }
}

/// Classify a downloaded file. Only HTML is checked for a paywall.
pub async fn classify_file(
    path: &Path,
    phrases: &[String],
    min_chars: usize,
) -> (FileType, PaywallStatus) {
    let content = match tokio::fs::read(path).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return (FileType::Unreadable, PaywallStatus::Unknown);
        }
    };
    match detect_file_type(&content) {
        FileType::Html => {
            let text = String::from_utf8_lossy(&content);
            (FileType::Html, detect_paywall(&text, phrases, min_chars))
        }
        other => (other, PaywallStatus::Unknown),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

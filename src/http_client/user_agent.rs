//! How outgoing requests identify themselves.

use rand::seq::IndexedRandom;

/// Names the crawler and its purpose to site operators.
const CRAWLER: &str =
    "stakeholder-acquire/0.3 (academic research; CBAM stakeholder documents)";

/// Desktop browser strings for `impersonate`. The DuckDuckGo HTML endpoint
/// serves results only to browsers.
const BROWSERS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0",
];

/// The `user_agent` setting of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAgent {
    /// Setting absent or blank.
    Crawler,
    /// `impersonate`: one browser string, picked per client.
    Browser,
    /// Sent verbatim.
    Custom(String),
}

impl UserAgent {
    pub fn from_setting(setting: Option<&str>) -> Self {
        match setting.map(str::trim) {
            None | Some("") => Self::Crawler,
            Some(s) if s.eq_ignore_ascii_case("impersonate") => Self::Browser,
            Some(s) => Self::Custom(s.to_string()),
        }
    }

    pub fn header_value(&self) -> &str {
        match self {
            Self::Crawler => CRAWLER,
            Self::Browser => BROWSERS.choose(&mut rand::rng()).copied().unwrap_or(CRAWLER),
            Self::Custom(value) => value,
        }
    }
}

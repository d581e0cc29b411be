//! DuckDuckGo HTML search provider.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use super::{SearchError, SearchProvider};
use crate::http_client::HttpClient;

/// DuckDuckGo search URL.
const DDG_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// Markers of the bot-challenge page DuckDuckGo serves instead of results.
const ANOMALY_MARKERS: &[&str] = &[
    "anomaly-modal",
    "challenge-form",
    "Unfortunately, bots use DuckDuckGo too",
];

/// Search provider backed by DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoProvider {
    client: HttpClient,
    endpoint: String,
}

impl DuckDuckGoProvider {
    pub fn new(client: HttpClient) -> Self {
        Self::with_endpoint(client, DDG_SEARCH_URL)
    }

    /// Post queries to `endpoint` instead of DuckDuckGo.
    pub fn with_endpoint(client: HttpClient, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    /// Parse result URLs from a results page, deduplicated in rank order.
    fn parse_results(html: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        let document = Html::parse_document(html);

        // DuckDuckGo HTML results are in <a class="result__a"> elements
        let result_selector = Selector::parse("a.result__a")
            .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {:?}", e)))?;

        let mut results: Vec<String> = Vec::new();
        for element in document.select(&result_selector) {
            let Some(url) = element.value().attr("href").and_then(extract_url) else {
                continue;
            };
            if !results.contains(&url) {
                results.push(url);
            }
            if max_results > 0 && results.len() >= max_results {
                break;
            }
        }

        debug!("Parsed {} results from DuckDuckGo", results.len());
        Ok(results)
    }

    fn is_anomaly_page(html: &str) -> bool {
        ANOMALY_MARKERS.iter().any(|m| html.contains(m))
    }
}

/// Extract the actual URL from DuckDuckGo's redirect URL.
fn extract_url(href: &str) -> Option<String> {
    // DuckDuckGo sometimes uses direct URLs, sometimes redirects
    if href.contains("duckduckgo.com/l/") {
        // Extract from redirect: //duckduckgo.com/l/?uddg=<encoded_url>&...
        let uddg_start = href.find("uddg=")?;
        let encoded = &href[uddg_start + 5..];
        let end = encoded.find('&').unwrap_or(encoded.len());
        urlencoding::decode(&encoded[..end])
            .ok()
            .map(|s| s.into_owned())
    } else if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else if href.starts_with("//") {
        Some(format!("https:{}", href))
    } else {
        None
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        debug!("DuckDuckGo search: {}", query);

        let response = self
            .client
            .post_form(&self.endpoint, &[("q", query), ("kl", "wt-wt")])
            .await?;

        let status = response.status.as_u16();
        // 202 is DuckDuckGo's soft block
        if matches!(status, 202 | 403 | 429) {
            return Err(SearchError::RateLimited(format!(
                "DuckDuckGo returned {}",
                response.status
            )));
        }
        if !response.is_success() {
            return Err(SearchError::Unavailable(format!(
                "DuckDuckGo returned {}",
                response.status
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Parse(format!("Failed to read response text: {}", e)))?;

        if Self::is_anomaly_page(&html) {
            return Err(SearchError::RateLimited(
                "DuckDuckGo served a bot challenge".to_string(),
            ));
        }

        Self::parse_results(&html, max_results)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::response::{Html as HtmlBody, IntoResponse};
    use axum::routing::post;
    use axum::{Form, Router};

    use super::*;
    use crate::http_client::UserAgent;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Feurofer.eu%2Fcbam.pdf&rut=abc">CBAM</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://www.example.org/position">Position</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://www.example.org/position">Duplicate</a>
          </div>
          <div class="result">
            <a class="result__a" href="/relative">Ignored</a>
          </div>
        </body></html>"#;

    #[test]
    fn extract_redirect_url() {
        assert_eq!(
            extract_url("//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.eu%2Fx%3Fy%3D1&rut=z"),
            Some("https://a.eu/x?y=1".to_string())
        );
    }

    #[test]
    fn extract_protocol_relative_url() {
        assert_eq!(
            extract_url("//example.gov/doc.pdf"),
            Some("https://example.gov/doc.pdf".to_string())
        );
    }

    #[test]
    fn parses_results_in_rank_order() {
        let urls = DuckDuckGoProvider::parse_results(RESULTS_PAGE, 20).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://eurofer.eu/cbam.pdf".to_string(),
                "https://www.example.org/position".to_string(),
            ]
        );
    }

    #[test]
    fn respects_max_results() {
        let urls = DuckDuckGoProvider::parse_results(RESULTS_PAGE, 1).unwrap();
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn detects_challenge_page() {
        assert!(DuckDuckGoProvider::is_anomaly_page(
            r#"<div class="anomaly-modal__title">Unfortunately, bots use DuckDuckGo too.</div>"#
        ));
        assert!(!DuckDuckGoProvider::is_anomaly_page(RESULTS_PAGE));
    }

    /// A DuckDuckGo stand-in; each path answers one way.
    async fn provider_for(path: &str) -> DuckDuckGoProvider {
        let app = Router::new()
            .route(
                "/html/",
                post(|Form(form): Form<HashMap<String, String>>| async move {
                    let posted = form.get("q").map(String::as_str) == Some("\"Eurofer\" +CBAM")
                        && form.get("kl").map(String::as_str) == Some("wt-wt");
                    HtmlBody(if posted { RESULTS_PAGE } else { "<html></html>" })
                }),
            )
            .route("/soft-block/", post(|| async { StatusCode::ACCEPTED.into_response() }))
            .route("/forbidden/", post(|| async { StatusCode::FORBIDDEN.into_response() }))
            .route(
                "/too-many/",
                post(|| async { StatusCode::TOO_MANY_REQUESTS.into_response() }),
            )
            .route(
                "/down/",
                post(|| async { StatusCode::INTERNAL_SERVER_ERROR.into_response() }),
            )
            .route(
                "/challenge/",
                post(|| async {
                    HtmlBody(r#"<form id="challenge-form"><div class="anomaly-modal"></div></form>"#)
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = HttpClient::new(Duration::from_secs(5), &UserAgent::Crawler).unwrap();
        DuckDuckGoProvider::with_endpoint(client, &format!("http://{}{}", addr, path))
    }

    #[tokio::test]
    async fn search_posts_the_query_and_parses_results() {
        let provider = provider_for("/html/").await;
        let urls = provider.search("\"Eurofer\" +CBAM", 20).await.unwrap();
        assert_eq!(
            urls,
            vec![
                "https://eurofer.eu/cbam.pdf".to_string(),
                "https://www.example.org/position".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn blocking_statuses_are_rate_limits() {
        for path in ["/soft-block/", "/forbidden/", "/too-many/"] {
            let err = provider_for(path).await.search("cbam", 20).await.unwrap_err();
            assert!(matches!(err, SearchError::RateLimited(_)), "{}: {:?}", path, err);
        }
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        let err = provider_for("/down/").await.search("cbam", 20).await.unwrap_err();
        assert!(matches!(err, SearchError::Unavailable(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn challenge_page_is_a_rate_limit() {
        let err = provider_for("/challenge/").await.search("cbam", 20).await.unwrap_err();
        assert!(matches!(err, SearchError::RateLimited(_)), "{:?}", err);
    }
}

//! Full pipeline run with a scripted search provider and a local web server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;

use stakeholder_acquire::config::Settings;
use stakeholder_acquire::discovery::{SearchError, SearchLog, SearchProvider};
use stakeholder_acquire::models::{DownloadStatus, ExtractStatus, ExtractionKind};
use stakeholder_acquire::pipeline::Pipeline;

/// Results for Eurofer; Cefic fails once, then has no results.
struct FakeProvider {
    base: String,
    cefic_calls: AtomicUsize,
}

#[async_trait]
impl SearchProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<String>, SearchError> {
        if query.contains("Eurofer") {
            return Ok(vec![
                format!("{}/cbam", self.base),
                "https://www.linkedin.com/company/eurofer".to_string(),
            ]);
        }
        if self.cefic_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(SearchError::Unavailable("connection reset".to_string()));
        }
        Ok(Vec::new())
    }
}

const PAGE: &str = "<html><head><title>Eurofer on CBAM</title></head><body><main>\
    <p>Eurofer welcomes the carbon border adjustment mechanism as a tool to protect \
    European steel producers against carbon leakage while the free allocation of \
    emission allowances is phased out.</p>\
    <p>Export solutions remain the missing piece of the regulation.</p></main></body></html>";

#[tokio::test]
async fn run_takes_organizations_to_extracted_text() {
    let app = Router::new().route("/cbam", get(|| async { axum::response::Html(PAGE) }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::with_data_dir(dir.path().to_path_buf());
    settings.search.min_delay = Duration::ZERO;
    settings.search.max_delay = Duration::ZERO;
    settings.search.error_cooldown = Duration::ZERO;
    settings.search.pass_interval = Duration::ZERO;
    settings.download.min_delay = Duration::ZERO;
    settings.download.max_delay = Duration::ZERO;
    settings.extraction.ocr_enabled = false;

    std::fs::create_dir_all(settings.organizations_file.parent().unwrap()).unwrap();
    std::fs::write(
        &settings.organizations_file,
        "org_title,search_title,reg_category\n\
         Eurofer AISBL,Eurofer,Trade association\n\
         Cefic,Cefic,Trade association\n",
    )
    .unwrap();

    let pipeline = Pipeline::new(settings);
    let provider = Arc::new(FakeProvider {
        base: base.clone(),
        cefic_calls: AtomicUsize::new(0),
    });
    let report = pipeline
        .run_with(Box::new(ArcProvider(provider.clone())))
        .await
        .unwrap();

    assert_eq!(report.organizations.inserted, 2);
    assert_eq!(report.search_passes.len(), 2);
    assert_eq!(provider.cefic_calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.cleanup.denylisted, 1);
    assert_eq!(report.cleanup.sentinels, 2);
    assert_eq!(report.download.succeeded, 1);
    assert_eq!(report.html.succeeded, 1);
    assert_eq!(report.pdf.promoted, 0);

    let log = SearchLog::new(pipeline.settings().search_log_path());
    let grouped = log.load().unwrap();
    assert_eq!(
        grouped,
        vec![
            (
                "Eurofer".to_string(),
                vec![
                    format!("{}/cbam", base),
                    "https://www.linkedin.com/company/eurofer".to_string(),
                ]
            ),
            (
                "Cefic".to_string(),
                vec!["error".to_string(), "no_results".to_string()]
            ),
        ]
    );

    let record = pipeline.db().urls().get(1).await.unwrap().unwrap();
    assert_eq!(record.url, format!("{}/cbam", base));
    assert_eq!(record.download_status, DownloadStatus::Success);

    let html = pipeline
        .db()
        .extractions(ExtractionKind::Html)
        .get(record.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(html.status, ExtractStatus::Success);
    let artifact = std::fs::read_to_string(html.extracted_text_path.unwrap()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&artifact).unwrap();
    assert_eq!(json["title"], "Eurofer on CBAM");

    // Everything is settled: a second run searches nothing and fetches nothing.
    let again = pipeline
        .run_with(Box::new(ArcProvider(provider.clone())))
        .await
        .unwrap();
    assert_eq!(provider.cefic_calls.load(Ordering::SeqCst), 2);
    assert_eq!(again.search_passes.len(), 1);
    assert_eq!(again.search_passes[0].searched, 0);
    assert_eq!(again.download.total(), 0);
    assert_eq!(again.html.succeeded, 0);
}

/// Lets the test keep a handle on the provider it passes in.
struct ArcProvider(Arc<FakeProvider>);

#[async_trait]
impl SearchProvider for ArcProvider {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        self.0.search(query, max_results).await
    }
}

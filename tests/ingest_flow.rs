//! Ingestion, cleanup and HTML extraction against a temp data directory.

use stakeholder_acquire::config::Settings;
use stakeholder_acquire::discovery::{SearchLog, SearchLogEntry};
use stakeholder_acquire::models::{DownloadStatus, ExtractStatus, ExtractionKind, FileType, PaywallStatus};
use stakeholder_acquire::pipeline::Pipeline;

const ORGS: &str = "org_title,search_title,reg_category\n\
                    Eurofer AISBL,Eurofer,Trade association\n\
                    Cefic,Cefic,Trade association\n";

const ARTICLE: &str = r#"<html><head><title>CBAM</title></head><body><article>
    <p>The carbon border adjustment mechanism applies to steel imports from 2026 onwards,
    and European producers expect it to level the playing field with importers.</p>
    <p>Eurofer calls for export solutions and robust anti-circumvention rules so that
    the mechanism does not push emissions elsewhere.</p></article></body></html>"#;

async fn setup() -> (tempfile::TempDir, Pipeline) {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::with_data_dir(dir.path().to_path_buf());
    settings.ensure_directories().unwrap();
    std::fs::create_dir_all(settings.organizations_file.parent().unwrap()).unwrap();
    std::fs::write(&settings.organizations_file, ORGS).unwrap();

    let pipeline = Pipeline::new(settings);
    pipeline.prepare().await.unwrap();
    pipeline.load_organizations().await.unwrap();
    (dir, pipeline)
}

fn write_log(pipeline: &Pipeline, rows: &[(&str, &str)]) {
    let log = SearchLog::new(pipeline.settings().search_log_path());
    let entries: Vec<SearchLogEntry> = rows
        .iter()
        .map(|(org, url)| SearchLogEntry::new(org, url))
        .collect();
    log.append(&entries).unwrap();
}

async fn urls(pipeline: &Pipeline) -> Vec<(i32, String)> {
    let mut rows: Vec<(i32, String)> = pipeline
        .db()
        .urls()
        .get_pending()
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.organization_id, r.url))
        .collect();
    rows.sort();
    rows
}

#[tokio::test]
async fn ingest_and_clean_keeps_only_useful_urls() {
    let (_dir, pipeline) = setup().await;
    write_log(
        &pipeline,
        &[
            ("Eurofer", "https://www.linkedin.com/x"),
            ("Eurofer", "https://google.com/search?q=y"),
            ("Eurofer", "https://eurofer.eu/z"),
            ("Eurofer", "https://eurofer.eu/z"),
            ("Cefic", "https://eurofer.eu/z"),
            ("Cefic", "no_results"),
            ("Unknown Org", "https://unknown.eu"),
        ],
    );

    let (ingest, cleanup) = pipeline.ingest(true).await.unwrap();
    assert_eq!(ingest.rows, 7);
    assert_eq!(ingest.added, 5);
    assert_eq!(ingest.duplicates, 1);
    assert_eq!(ingest.unknown_organization, 1);
    assert_eq!(cleanup.sentinels, 1);
    assert_eq!(cleanup.denylisted, 2);

    // The same url under two organizations survives for both.
    let remaining = urls(&pipeline).await;
    assert_eq!(
        remaining,
        vec![
            (1, "https://eurofer.eu/z".to_string()),
            (2, "https://eurofer.eu/z".to_string()),
        ]
    );

    // Placeholders and denylisted rows come back from the log and are removed again.
    let (again, cleanup) = pipeline.ingest(true).await.unwrap();
    assert_eq!(again.added, 3);
    assert_eq!(cleanup.total(), 3);
    assert_eq!(urls(&pipeline).await, remaining);
}

#[tokio::test]
async fn file_paths_follow_org_and_url_ids() {
    let (_dir, pipeline) = setup().await;
    write_log(&pipeline, &[("Cefic", "https://cefic.org/a")]);
    pipeline.ingest(false).await.unwrap();

    let pending = pipeline.db().urls().get_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].file_path, format!("2_{}", pending[0].id));
    assert_eq!(pending[0].download_status, DownloadStatus::Pending);
}

#[tokio::test]
async fn html_extraction_writes_one_artifact_per_record() {
    let (_dir, pipeline) = setup().await;
    write_log(
        &pipeline,
        &[
            ("Eurofer", "https://eurofer.eu/article"),
            ("Eurofer", "https://eurofer.eu/empty"),
            ("Eurofer", "https://eurofer.eu/paywalled"),
        ],
    );
    pipeline.ingest(true).await.unwrap();

    let settings = pipeline.settings();
    let repo = pipeline.db().urls();
    let pending = repo.get_pending().await.unwrap();
    let (article, empty, paywalled) = (&pending[0], &pending[1], &pending[2]);

    std::fs::write(settings.downloads_dir.join(&article.file_path), ARTICLE).unwrap();
    std::fs::write(
        settings.downloads_dir.join(&empty.file_path),
        "<html><body><nav><p>Menu</p></nav></body></html>",
    )
    .unwrap();
    for (record, paywall) in [
        (article, PaywallStatus::Unknown),
        (empty, PaywallStatus::Unknown),
        (paywalled, PaywallStatus::Detected),
    ] {
        assert!(repo
            .mark_download(record.id, DownloadStatus::Success, Some(FileType::Html), Some(paywall))
            .await
            .unwrap());
    }

    let report = pipeline.extract_html().await.unwrap();
    assert_eq!(report.promoted, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    let extractions = pipeline.db().extractions(ExtractionKind::Html);
    let done = extractions.get(article.id).await.unwrap().unwrap();
    assert_eq!(done.status, ExtractStatus::Success);
    let artifact = settings.html_text_dir.join(format!("1_{}.json", article.id));
    assert_eq!(done.extracted_text_path.as_deref(), artifact.to_str());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&artifact).unwrap()).unwrap();
    assert_eq!(json["title"], "CBAM");
    assert_eq!(json["author"], "unknown");
    assert!(json["text"].as_str().unwrap().starts_with("The carbon border"));

    let failed = extractions.get(empty.id).await.unwrap().unwrap();
    assert_eq!(failed.status, ExtractStatus::Failure);
    let errors = std::fs::read_to_string(settings.html_error_log_path()).unwrap();
    assert!(errors.starts_with("file_id,organization_id,file_path,error_message\n"));
    assert!(errors.contains(&empty.file_path));

    // Paywalled pages are never promoted.
    assert!(extractions.get(paywalled.id).await.unwrap().is_none());

    // A second run leaves finished records alone.
    std::fs::remove_file(&artifact).unwrap();
    let again = pipeline.extract_html().await.unwrap();
    assert_eq!(again.promoted, 0);
    assert_eq!(again.succeeded + again.failed, 0);
    assert!(!artifact.exists());
    assert_eq!(
        std::fs::read_dir(&settings.html_text_dir).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn reset_returns_failed_extractions_to_pending() {
    let (_dir, pipeline) = setup().await;
    write_log(&pipeline, &[("Cefic", "https://cefic.org/missing")]);
    pipeline.ingest(true).await.unwrap();

    let record = pipeline.db().urls().get_pending().await.unwrap().remove(0);
    pipeline
        .db()
        .urls()
        .mark_download(record.id, DownloadStatus::Success, Some(FileType::Html), Some(PaywallStatus::Unknown))
        .await
        .unwrap();

    // The downloaded file is gone, so extraction fails.
    let report = pipeline.extract_html().await.unwrap();
    assert_eq!(report.failed, 1);

    let extractions = pipeline.db().extractions(ExtractionKind::Html);
    assert_eq!(extractions.reset_failed().await.unwrap(), 1);
    std::fs::write(
        pipeline.settings().downloads_dir.join(&record.file_path),
        ARTICLE,
    )
    .unwrap();
    let report = pipeline.extract_html().await.unwrap();
    assert_eq!(report.succeeded, 1);
}

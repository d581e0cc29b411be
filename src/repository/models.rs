//! Diesel row types and their conversion into domain models.

use diesel::prelude::*;

use crate::models::{
    DownloadStatus, ExtractStatus, ExtractionKind, ExtractionRecord, FileType, Organization,
    PaywallStatus, UrlRecord,
};
use crate::schema;

/// Organization record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::organizations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrganizationRecord {
    pub id: i32,
    pub registered_organisation_title: String,
    pub search_title: String,
    pub category: String,
}

/// New organization for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::organizations)]
pub struct NewOrganizationRecord<'a> {
    pub registered_organisation_title: &'a str,
    pub search_title: &'a str,
    pub category: &'a str,
}

impl From<OrganizationRecord> for Organization {
    fn from(record: OrganizationRecord) -> Self {
        Organization {
            id: record.id,
            registered_title: record.registered_organisation_title,
            search_title: record.search_title,
            category: record.category,
        }
    }
}

/// URL record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::urls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UrlRow {
    pub id: i32,
    pub organization_id: i32,
    pub url: String,
    pub file_path: String,
    pub download_status: String,
    pub file_type: Option<String>,
    pub paywall_status: Option<String>,
    pub updated_at: Option<String>,
}

impl From<UrlRow> for UrlRecord {
    fn from(row: UrlRow) -> Self {
        UrlRecord {
            id: row.id,
            organization_id: row.organization_id,
            url: row.url,
            file_path: row.file_path,
            download_status: DownloadStatus::from_str(&row.download_status)
                .unwrap_or(DownloadStatus::Failure),
            file_type: row.file_type.as_deref().and_then(FileType::from_str),
            paywall_status: row.paywall_status.as_deref().and_then(PaywallStatus::from_str),
            updated_at: row.updated_at,
        }
    }
}

/// Row of `html_text` or `pdf_text`; both tables share the column layout.
#[derive(Queryable, Debug, Clone)]
pub struct ExtractionRow {
    pub id: i32,
    pub organization_id: i32,
    pub source_file: String,
    pub extracted_text_path: Option<String>,
    pub extract_status: String,
    pub updated_at: Option<String>,
}

impl ExtractionRow {
    pub fn into_record(self, kind: ExtractionKind) -> ExtractionRecord {
        ExtractionRecord {
            id: self.id,
            kind,
            organization_id: self.organization_id,
            source_file: self.source_file,
            extracted_text_path: self.extracted_text_path,
            status: ExtractStatus::from_str(&self.extract_status)
                .unwrap_or(ExtractStatus::Failure),
            updated_at: self.updated_at,
        }
    }
}

/// `status, count` pair for raw grouping queries.
#[derive(QueryableByName, Debug)]
pub(crate) struct StatusCount {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub status: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub count: i64,
}

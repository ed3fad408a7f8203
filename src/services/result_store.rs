//! Persistence of certificate analyses, keyed by certificate id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;

use crate::models::analysis::{AnalysisDraft, CertificateAnalysis, ExtractedFields};

#[derive(Debug, Error)]
pub enum ResultStoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("stored analysis is not valid JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where analyses are written. Writes replace any earlier record for the
/// same certificate.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn upsert(&self, draft: AnalysisDraft) -> Result<CertificateAnalysis, ResultStoreError>;

    async fn get(&self, certificate_id: &str)
    -> Result<Option<CertificateAnalysis>, ResultStoreError>;
}

/// `certificate_analyses` table in the service database.
#[derive(Clone)]
pub struct SqliteResultStore {
    db: Arc<SqlitePool>,
}

#[derive(FromRow)]
struct AnalysisRow {
    certificate_id: String,
    file_path: String,
    text: String,
    possible_code: Option<String>,
    possible_issuer: Option<String>,
    possible_dates: String,
    raw_analysis: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<AnalysisRow> for CertificateAnalysis {
    type Error = ResultStoreError;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        Ok(CertificateAnalysis {
            certificate_id: row.certificate_id,
            file_path: row.file_path,
            analysis: ExtractedFields {
                text: row.text,
                possible_code: row.possible_code,
                possible_issuer: row.possible_issuer,
                possible_dates: serde_json::from_str(&row.possible_dates)?,
            },
            raw_analysis: serde_json::from_str(&row.raw_analysis)?,
            timestamp: row.timestamp,
        })
    }
}

impl SqliteResultStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn upsert(&self, draft: AnalysisDraft) -> Result<CertificateAnalysis, ResultStoreError> {
        let record = draft.stamped(Utc::now());
        let possible_dates = serde_json::to_string(&record.analysis.possible_dates)?;
        let raw_analysis = serde_json::to_string(&record.raw_analysis)?;

        sqlx::query(
            r#"
            INSERT INTO certificate_analyses (
                certificate_id, file_path, text, possible_code, possible_issuer,
                possible_dates, raw_analysis, timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(certificate_id) DO UPDATE SET
                file_path = excluded.file_path,
                text = excluded.text,
                possible_code = excluded.possible_code,
                possible_issuer = excluded.possible_issuer,
                possible_dates = excluded.possible_dates,
                raw_analysis = excluded.raw_analysis,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(&record.certificate_id)
        .bind(&record.file_path)
        .bind(&record.analysis.text)
        .bind(&record.analysis.possible_code)
        .bind(&record.analysis.possible_issuer)
        .bind(possible_dates)
        .bind(raw_analysis)
        .bind(record.timestamp)
        .execute(&*self.db)
        .await?;

        Ok(record)
    }

    async fn get(
        &self,
        certificate_id: &str,
    ) -> Result<Option<CertificateAnalysis>, ResultStoreError> {
        let row = sqlx::query_as::<_, AnalysisRow>(
            "SELECT certificate_id, file_path, text, possible_code, possible_issuer,
                    possible_dates, raw_analysis, timestamp
             FROM certificate_analyses WHERE certificate_id = ?",
        )
        .bind(certificate_id)
        .fetch_optional(&*self.db)
        .await?;

        row.map(CertificateAnalysis::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    fn draft(id: &str, code: Option<&str>, dates: &[&str]) -> AnalysisDraft {
        AnalysisDraft {
            certificate_id: id.to_string(),
            file_path: format!("certificates/{id}_1.jpg"),
            analysis: ExtractedFields {
                text: "line one\nline two".into(),
                possible_code: code.map(str::to_string),
                possible_issuer: None,
                possible_dates: dates.iter().map(|d| d.to_string()).collect(),
            },
            raw_analysis: json!({ "status": "succeeded", "code": code }),
        }
    }

    async fn store() -> SqliteResultStore {
        SqliteResultStore::new(Arc::new(db::connect_in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn upsert_then_get() {
        let store = store().await;
        let written = store
            .upsert(draft("c1", Some("ABC123"), &["05/01/2024"]))
            .await
            .unwrap();

        let read = store.get("c1").await.unwrap().unwrap();
        assert_eq!(read.analysis, written.analysis);
        assert_eq!(read.file_path, "certificates/c1_1.jpg");
        assert_eq!(read.raw_analysis, json!({ "status": "succeeded", "code": "ABC123" }));
        assert_eq!(read.timestamp, written.timestamp);
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        assert!(store().await.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_write_replaces_first() {
        let store = store().await;
        store
            .upsert(draft("c1", Some("FIRST1"), &["1/1/2020", "2/2/2020"]))
            .await
            .unwrap();
        store.upsert(draft("c1", None, &[])).await.unwrap();

        let read = store.get("c1").await.unwrap().unwrap();
        assert_eq!(read.analysis.possible_code, None);
        assert!(read.analysis.possible_dates.is_empty());
        assert_eq!(read.raw_analysis["code"], serde_json::Value::Null);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM certificate_analyses")
            .fetch_one(&*store.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}

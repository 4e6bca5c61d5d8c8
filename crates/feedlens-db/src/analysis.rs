//! Analysis record repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use feedlens_core::{AnalysisRecord, AnalysisRepository, Error, Result, SummaryKey};

/// PostgreSQL analysis repository.
#[derive(Clone)]
pub struct PgAnalysisRepository {
    pool: Pool<Postgres>,
}

impl PgAnalysisRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisRepository for PgAnalysisRepository {
    async fn upsert_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO comment_analysis (
                comment_id, created_at, sentiment_result, title, type, category, ai_title,
                short_title, normalized_title, keywords, severity, priority, evidence,
                model, processed_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             ON CONFLICT (comment_id) DO UPDATE SET
                sentiment_result = EXCLUDED.sentiment_result,
                title = EXCLUDED.title,
                type = EXCLUDED.type,
                category = EXCLUDED.category,
                ai_title = EXCLUDED.ai_title,
                short_title = EXCLUDED.short_title,
                normalized_title = EXCLUDED.normalized_title,
                keywords = EXCLUDED.keywords,
                severity = EXCLUDED.severity,
                priority = EXCLUDED.priority,
                evidence = EXCLUDED.evidence,
                model = EXCLUDED.model,
                processed_at = EXCLUDED.processed_at",
        )
        .bind(record.comment_id)
        .bind(record.created_at)
        .bind(&record.sentiment_result)
        .bind(&record.title)
        .bind(record.comment_type.as_str())
        .bind(record.category.as_str())
        .bind(record.ai_title.as_str())
        .bind(&record.short_title)
        .bind(&record.normalized_title)
        .bind(&record.keywords)
        .bind(record.severity.map(|l| l.as_str()))
        .bind(record.priority.map(|l| l.as_str()))
        .bind(&record.evidence)
        .bind(&record.model)
        .bind(record.processed_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("UPDATE comments SET is_analyzed = TRUE WHERE id = $1")
            .bind(record.comment_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "analysis",
            op = "upsert",
            comment_id = record.comment_id,
            "Analysis stored"
        );
        Ok(())
    }

    async fn fetch_titles_for_summary(&self, key: &SummaryKey) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT normalized_title
             FROM comment_analysis
             WHERE title = $1
               AND type = $2
               AND category = $3
               AND sentiment_result = $4
               AND created_at::date BETWEEN $5 AND $6
             ORDER BY comment_id ASC",
        )
        .bind(&key.title)
        .bind(&key.comment_type)
        .bind(&key.category)
        .bind(&key.sentiment)
        .bind(key.start_date)
        .bind(key.end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(|r| r.get("normalized_title")).collect())
    }
}

//! Comment summary repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use feedlens_core::{CommentSummary, Error, Result, SummaryRepository};

/// PostgreSQL summary repository.
#[derive(Clone)]
pub struct PgSummaryRepository {
    pool: Pool<Postgres>,
}

impl PgSummaryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryRepository for PgSummaryRepository {
    async fn upsert_summary(&self, summary: &CommentSummary) -> Result<()> {
        let key = &summary.key;
        sqlx::query(
            "INSERT INTO comment_summaries (
                title, type, category, sentiment, start_date, end_date,
                summary, comment_count, chunk_count, processed_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (title, type, category, sentiment, start_date, end_date) DO UPDATE SET
                summary = EXCLUDED.summary,
                comment_count = EXCLUDED.comment_count,
                chunk_count = EXCLUDED.chunk_count,
                processed_at = EXCLUDED.processed_at",
        )
        .bind(&key.title)
        .bind(&key.comment_type)
        .bind(&key.category)
        .bind(&key.sentiment)
        .bind(key.start_date)
        .bind(key.end_date)
        .bind(&summary.summary)
        .bind(summary.comment_count as i32)
        .bind(summary.chunk_count as i32)
        .bind(summary.processed_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

//! Comment repository.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tracing::{debug, info};

use feedlens_core::{
    Comment, CommentRepository, DuplicateLink, Error, NewComment, NgramFilter, Result, ScanRow,
    SentimentLabel,
};

const COMMENT_COLUMNS: &str = "id, user_hash, app_id, title, description, grade, sentiment_result, \
     created_at, is_repetitive, duplicate_of, is_analyzed";

/// PostgreSQL comment repository.
#[derive(Clone)]
pub struct PgCommentRepository {
    pool: Pool<Postgres>,
}

impl PgCommentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &PgRow) -> Comment {
        Comment {
            id: row.get("id"),
            user_hash: row.get("user_hash"),
            app_id: row.get("app_id"),
            title: row.get("title"),
            description: row.get("description"),
            grade: row.get("grade"),
            sentiment_result: row.get("sentiment_result"),
            created_at: row.get("created_at"),
            is_repetitive: row.get("is_repetitive"),
            duplicate_of: row.get("duplicate_of"),
            is_analyzed: row.get("is_analyzed"),
        }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    async fn fetch_unanalyzed(&self, limit: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS}
             FROM comments
             WHERE is_repetitive IS FALSE
               AND is_analyzed IS FALSE
               AND description IS NOT NULL
               AND LENGTH(TRIM(description)) > 2
             ORDER BY id ASC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "comments",
            op = "fetch_unanalyzed",
            count = rows.len(),
            "Fetched comments for analysis"
        );
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn fetch_for_duplicate_scan(&self) -> Result<Vec<ScanRow>> {
        let rows = sqlx::query(
            "SELECT id, user_hash, title, description, created_at
             FROM comments
             WHERE description IS NOT NULL
               AND COALESCE(sentiment_result, '') <> 'no comments'
             ORDER BY user_hash, created_at, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|r| ScanRow {
                comment_id: r.get("id"),
                user_hash: r.get("user_hash"),
                title: r.get("title"),
                description: r.get("description"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn replace_duplicate_flags(&self, links: &[DuplicateLink]) -> Result<u64> {
        let (ids, originals): (Vec<i64>, Vec<i64>) = links
            .iter()
            .filter(|l| l.is_repetitive)
            .filter_map(|l| l.duplicate_of.map(|orig| (l.comment_id, orig)))
            .unzip();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let cleared = sqlx::query(
            "UPDATE comments SET is_repetitive = FALSE, duplicate_of = NULL
             WHERE is_repetitive OR duplicate_of IS NOT NULL",
        )
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        let flagged = sqlx::query(
            "UPDATE comments AS c
             SET is_repetitive = TRUE, duplicate_of = d.original_id
             FROM UNNEST($1::bigint[], $2::bigint[]) AS d(id, original_id)
             WHERE c.id = d.id",
        )
        .bind(&ids)
        .bind(&originals)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "comments",
            op = "replace_duplicate_flags",
            cleared,
            flagged,
            "Duplicate flags replaced"
        );
        Ok(flagged)
    }

    async fn fetch_unscored(&self, app_ids: Option<&[i64]>, limit: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS}
             FROM comments
             WHERE (sentiment_result IS NULL OR sentiment_result = '')
               AND is_repetitive IS FALSE
               AND ($1::bigint[] IS NULL OR app_id = ANY($1))
             ORDER BY id ASC
             LIMIT $2"
        ))
        .bind(app_ids.map(<[i64]>::to_vec))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn update_sentiment(&self, comment_id: i64, label: SentimentLabel) -> Result<()> {
        let result = sqlx::query(
            "UPDATE comments SET sentiment_result = $1, sentiment_score = $2 WHERE id = $3",
        )
        .bind(label.as_str())
        .bind(label.score())
        .bind(comment_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("comment {comment_id}")));
        }
        Ok(())
    }

    async fn fetch_ngram_corpus(&self, filter: &NgramFilter) -> Result<Vec<String>> {
        let labels: Option<Vec<String>> = filter
            .sentiment
            .as_deref()
            .and_then(SentimentLabel::group)
            .map(|group| group.iter().map(|l| l.as_str().to_string()).collect());

        let rows = sqlx::query(
            "SELECT description
             FROM comments
             WHERE description IS NOT NULL
               AND is_repetitive IS FALSE
               AND sentiment_score > 0
               AND ($1::text[] IS NULL OR lower(sentiment_result) = ANY($1))
               AND ($2::date IS NULL OR created_at::date >= $2)
               AND ($3::date IS NULL OR created_at::date <= $3)
             ORDER BY id ASC",
        )
        .bind(labels)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(|r| r.get("description")).collect())
    }

    async fn insert_comments(&self, comments: &[NewComment]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut inserted = 0;

        for c in comments {
            inserted += sqlx::query(
                "INSERT INTO comments (user_hash, app_id, title, description, grade, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (user_hash, created_at) DO NOTHING",
            )
            .bind(&c.user_hash)
            .bind(c.app_id)
            .bind(&c.title)
            .bind(&c.description)
            .bind(c.grade)
            .bind(c.created_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(inserted)
    }
}

//! Core traits for feedlens abstractions.

use async_trait::async_trait;

use crate::duplicates::ScanRow;
use crate::models::*;
use crate::Result;

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate with JSON output enforced where the backend supports it.
    async fn generate_json_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_with_system(system, prompt).await
    }

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Assigns a sentiment label to comment text.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SentimentLabel>;

    fn model_name(&self) -> &str;
}

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for stored comments.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Comments awaiting structured analysis, ordered by id.
    ///
    /// Excludes analyzed and repetitive comments and those whose trimmed
    /// text is two characters or shorter.
    async fn fetch_unanalyzed(&self, limit: i64) -> Result<Vec<Comment>>;

    /// Rows eligible for duplicate detection: non-null description and a
    /// sentiment other than "no comments".
    async fn fetch_for_duplicate_scan(&self) -> Result<Vec<ScanRow>>;

    /// Clear every repetitive flag, then apply `links`, atomically.
    /// Returns the number of comments flagged.
    async fn replace_duplicate_flags(&self, links: &[DuplicateLink]) -> Result<u64>;

    /// Non-repetitive comments with no sentiment yet, ordered by id.
    /// `app_ids = None` means every app.
    async fn fetch_unscored(&self, app_ids: Option<&[i64]>, limit: i64) -> Result<Vec<Comment>>;

    /// Store a sentiment label and its score.
    async fn update_sentiment(&self, comment_id: i64, label: SentimentLabel) -> Result<()>;

    /// Texts of scored, non-repetitive comments matching `filter`.
    async fn fetch_ngram_corpus(&self, filter: &NgramFilter) -> Result<Vec<String>>;

    /// Insert crawled comments, skipping any already stored for the same
    /// user and timestamp. Returns the number inserted.
    async fn insert_comments(&self, comments: &[NewComment]) -> Result<u64>;
}

/// Repository for analysis records.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Insert or update the record for its comment and mark the comment
    /// analyzed, in one transaction.
    async fn upsert_analysis(&self, record: &AnalysisRecord) -> Result<()>;

    /// Normalized titles of analyses matching a summary key.
    async fn fetch_titles_for_summary(&self, key: &SummaryKey) -> Result<Vec<String>>;
}

/// Repository for comment summaries.
#[async_trait]
pub trait SummaryRepository: Send + Sync {
    /// Insert or replace by natural key.
    async fn upsert_summary(&self, summary: &CommentSummary) -> Result<()>;
}

// =============================================================================
// INGESTION
// =============================================================================

/// Source of raw comments for one store app.
#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn fetch_comments(&self, app_id: i64) -> Result<Vec<RawComment>>;
}

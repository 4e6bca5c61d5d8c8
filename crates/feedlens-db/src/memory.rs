//! In-memory store implementing every repository trait.
//!
//! Used by tests and dry runs. Query semantics follow the Postgres
//! repositories; each method takes the lock once, so a call is atomic with
//! respect to other calls.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use feedlens_core::{
    AnalysisRecord, AnalysisRepository, Comment, CommentRepository, CommentSummary,
    DuplicateLink, Error, NewComment, NgramFilter, Result, ScanRow, SentimentLabel, SummaryKey,
    SummaryRepository,
};

#[derive(Debug, Default)]
struct State {
    comments: BTreeMap<i64, Comment>,
    analyses: BTreeMap<i64, AnalysisRecord>,
    summaries: Vec<CommentSummary>,
    failing_upserts: HashSet<i64>,
    next_id: i64,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared in-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a comment as given. A zero id is replaced with a fresh one.
    pub async fn add_comment(&self, mut comment: Comment) -> i64 {
        let mut state = self.state.lock().await;
        if comment.id == 0 {
            comment.id = state.allocate_id();
        } else {
            state.next_id = state.next_id.max(comment.id);
        }
        let id = comment.id;
        state.comments.insert(id, comment);
        id
    }

    /// Make `upsert_analysis` fail for these comment ids.
    pub async fn fail_upserts_for(&self, ids: &[i64]) {
        self.state.lock().await.failing_upserts.extend(ids);
    }

    pub async fn comment(&self, id: i64) -> Option<Comment> {
        self.state.lock().await.comments.get(&id).cloned()
    }

    pub async fn comments(&self) -> Vec<Comment> {
        self.state.lock().await.comments.values().cloned().collect()
    }

    pub async fn analysis(&self, comment_id: i64) -> Option<AnalysisRecord> {
        self.state.lock().await.analyses.get(&comment_id).cloned()
    }

    pub async fn analyses(&self) -> Vec<AnalysisRecord> {
        self.state.lock().await.analyses.values().cloned().collect()
    }

    pub async fn summaries(&self) -> Vec<CommentSummary> {
        self.state.lock().await.summaries.clone()
    }
}

fn is_unscored(c: &Comment) -> bool {
    c.sentiment_result.as_deref().map_or(true, str::is_empty)
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn fetch_unanalyzed(&self, limit: i64) -> Result<Vec<Comment>> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .values()
            .filter(|c| !c.is_repetitive && !c.is_analyzed)
            .filter(|c| c.description.as_deref().map_or(0, |d| d.trim().chars().count()) > 2)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn fetch_for_duplicate_scan(&self) -> Result<Vec<ScanRow>> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .values()
            .filter(|c| c.sentiment_result.as_deref() != Some(SentimentLabel::NoComments.as_str()))
            .filter_map(|c| {
                Some(ScanRow {
                    comment_id: c.id,
                    user_hash: c.user_hash.clone(),
                    title: c.title.clone(),
                    description: c.description.clone()?,
                    created_at: c.created_at,
                })
            })
            .collect())
    }

    async fn replace_duplicate_flags(&self, links: &[DuplicateLink]) -> Result<u64> {
        let mut state = self.state.lock().await;
        for c in state.comments.values_mut() {
            c.is_repetitive = false;
            c.duplicate_of = None;
        }
        let mut flagged = 0;
        for link in links.iter().filter(|l| l.is_repetitive) {
            if let Some(c) = state.comments.get_mut(&link.comment_id) {
                c.is_repetitive = true;
                c.duplicate_of = link.duplicate_of;
                flagged += 1;
            }
        }
        Ok(flagged)
    }

    async fn fetch_unscored(&self, app_ids: Option<&[i64]>, limit: i64) -> Result<Vec<Comment>> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .values()
            .filter(|c| is_unscored(c) && !c.is_repetitive)
            .filter(|c| match app_ids {
                Some(ids) => c.app_id.is_some_and(|a| ids.contains(&a)),
                None => true,
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update_sentiment(&self, comment_id: i64, label: SentimentLabel) -> Result<()> {
        let mut state = self.state.lock().await;
        let comment = state
            .comments
            .get_mut(&comment_id)
            .ok_or_else(|| Error::NotFound(format!("comment {comment_id}")))?;
        comment.sentiment_result = Some(label.as_str().to_string());
        Ok(())
    }

    async fn fetch_ngram_corpus(&self, filter: &NgramFilter) -> Result<Vec<String>> {
        let group = filter.sentiment.as_deref().and_then(SentimentLabel::group);
        let state = self.state.lock().await;
        Ok(state
            .comments
            .values()
            .filter(|c| !c.is_repetitive)
            .filter(|c| {
                let label = c
                    .sentiment_result
                    .as_deref()
                    .and_then(SentimentLabel::parse_lenient);
                match label {
                    Some(l) if l.score() > 0 => group.map_or(true, |g| g.contains(&l)),
                    _ => false,
                }
            })
            .filter(|c| {
                let day = c.created_at.map(|t| t.date_naive());
                let after_start = match (filter.start_date, day) {
                    (Some(start), Some(d)) => d >= start,
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                let before_end = match (filter.end_date, day) {
                    (Some(end), Some(d)) => d <= end,
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                after_start && before_end
            })
            .filter_map(|c| c.description.clone())
            .collect())
    }

    async fn insert_comments(&self, comments: &[NewComment]) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut inserted = 0;
        for new in comments {
            let exists = state
                .comments
                .values()
                .any(|c| new.created_at.is_some() && c.user_hash == new.user_hash && c.created_at == new.created_at);
            if exists {
                continue;
            }
            let id = state.allocate_id();
            state.comments.insert(
                id,
                Comment {
                    id,
                    user_hash: new.user_hash.clone(),
                    app_id: Some(new.app_id),
                    title: new.title.clone(),
                    description: new.description.clone(),
                    grade: new.grade,
                    sentiment_result: None,
                    created_at: new.created_at,
                    is_repetitive: false,
                    duplicate_of: None,
                    is_analyzed: false,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[async_trait]
impl AnalysisRepository for MemoryStore {
    async fn upsert_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.failing_upserts.contains(&record.comment_id) {
            return Err(Error::Internal(format!(
                "simulated write failure for comment {}",
                record.comment_id
            )));
        }
        state.analyses.insert(record.comment_id, record.clone());
        if let Some(c) = state.comments.get_mut(&record.comment_id) {
            c.is_analyzed = true;
        }
        Ok(())
    }

    async fn fetch_titles_for_summary(&self, key: &SummaryKey) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .analyses
            .values()
            .filter(|a| {
                a.title.as_deref() == Some(key.title.as_str())
                    && a.comment_type.as_str() == key.comment_type
                    && a.category.as_str() == key.category
                    && a.sentiment_result.as_deref() == Some(key.sentiment.as_str())
                    && a.created_at.is_some_and(|t| {
                        let d = t.date_naive();
                        d >= key.start_date && d <= key.end_date
                    })
            })
            .map(|a| a.normalized_title.clone())
            .collect())
    }
}

#[async_trait]
impl SummaryRepository for MemoryStore {
    async fn upsert_summary(&self, summary: &CommentSummary) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.summaries.iter_mut().find(|s| s.key == summary.key) {
            Some(existing) => *existing = summary.clone(),
            None => state.summaries.push(summary.clone()),
        }
        Ok(())
    }
}

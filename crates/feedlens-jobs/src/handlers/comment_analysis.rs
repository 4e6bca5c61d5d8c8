//! Comment analysis job.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument};

use feedlens_core::{
    defaults, AnalysisRepository, BatchSummary, CommentRepository, Error, JobKind, Result,
};

use super::env_or;
use crate::analysis::CommentAnalyzer;
use crate::handler::{JobContext, JobHandler, JobResult};

#[derive(Debug, Default, Deserialize)]
struct Args {
    #[serde(default)]
    limit: Option<i64>,
}

/// Analyzes one batch of unanalyzed comments.
pub struct CommentAnalysisHandler {
    comments: Arc<dyn CommentRepository>,
    analyses: Arc<dyn AnalysisRepository>,
    analyzer: CommentAnalyzer,
    batch_size: i64,
}

impl CommentAnalysisHandler {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        analyses: Arc<dyn AnalysisRepository>,
        analyzer: CommentAnalyzer,
    ) -> Self {
        Self {
            comments,
            analyses,
            analyzer,
            batch_size: env_or("ANALYSIS_BATCH_SIZE", defaults::ANALYSIS_BATCH_SIZE),
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[async_trait]
impl JobHandler for CommentAnalysisHandler {
    fn kind(&self) -> JobKind {
        JobKind::CommentAnalysis
    }

    fn requires_exclusive(&self) -> bool {
        true
    }

    #[instrument(skip(self, ctx), fields(subsystem = "jobs", component = "comment_analysis", op = "execute", task_id = %ctx.task_id, model = %self.analyzer.model_name()))]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        JobResult::from_result(self.run(&ctx).await)
    }
}

impl CommentAnalysisHandler {
    async fn run(&self, ctx: &JobContext) -> Result<BatchSummary> {
        let args: Args = ctx.args_as()?;
        let limit = args.limit.unwrap_or(self.batch_size);
        if limit <= 0 {
            return Err(Error::InvalidInput(format!("limit must be positive, got {limit}")));
        }

        ctx.report_progress(5, Some("Fetching unanalyzed comments"));
        let comments = self.comments.fetch_unanalyzed(limit).await?;
        if comments.is_empty() {
            info!("No comments to analyze");
        }

        ctx.report_progress(10, Some("Analyzing comments"));
        let summary = self.analyzer.run_batch(&comments, self.analyses.as_ref()).await;
        ctx.report_progress(100, Some("Analysis complete"));
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedlens_core::{Comment, TaskId};
    use feedlens_db::MemoryStore;
    use feedlens_inference::mock::MockGenerationBackend;

    fn short(text: &str) -> Comment {
        Comment {
            id: 0,
            user_hash: "u".into(),
            app_id: None,
            title: Some("پرداخت قبض".into()),
            description: Some(text.into()),
            grade: None,
            sentiment_result: Some("positive".into()),
            created_at: None,
            is_repetitive: false,
            duplicate_of: None,
            is_analyzed: false,
        }
    }

    fn handler(store: &MemoryStore) -> CommentAnalysisHandler {
        let analyzer = CommentAnalyzer::new(Arc::new(MockGenerationBackend::new()));
        CommentAnalysisHandler::new(Arc::new(store.clone()), Arc::new(store.clone()), analyzer)
            .with_batch_size(100)
    }

    #[tokio::test]
    async fn test_limit_bounds_batch() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            store.add_comment(short("عالیه")).await;
        }

        let ctx = JobContext::new(TaskId(1), JobKind::CommentAnalysis, serde_json::json!({"limit": 2}));
        let JobResult::Success(Some(value)) = handler(&store).execute(ctx).await else {
            panic!("expected success");
        };
        let summary: BatchSummary = serde_json::from_value(value).unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(store.analyses().await.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_limit() {
        let store = MemoryStore::new();
        let ctx = JobContext::new(TaskId(1), JobKind::CommentAnalysis, serde_json::json!({"limit": 0}));
        assert!(matches!(handler(&store).execute(ctx).await, JobResult::Failed(_)));
    }

    #[test]
    fn test_requires_exclusive() {
        assert!(handler(&MemoryStore::new()).requires_exclusive());
    }
}

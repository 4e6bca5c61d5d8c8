//! Chunked summarization of analyzed comments.
//!
//! Every (title, type, category, sentiment) combination is summarized on
//! its own: normalized titles are split into chunks, each chunk gets a
//! summary, and more than one chunk triggers a final merge call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use feedlens_core::{
    defaults, AnalysisRepository, CommentSummary, Error, GenerationBackend, JobKind, Result,
    SummaryKey, SummaryRepository,
};
use feedlens_inference::{merge_summaries, summarize_chunk, RetryPolicy, SummaryContext};

use super::env_or;
use crate::handler::{JobContext, JobHandler, JobResult};

#[derive(Debug, Deserialize)]
struct Args {
    titles: Vec<String>,
    types: Vec<String>,
    categories: Vec<String>,
    sentiments: Vec<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

/// Result payload of a summarization task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationOutput {
    pub message: String,
    pub data: Vec<CommentSummary>,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub failed: usize,
}

/// Every (title, type, category, sentiment) combination over the date range.
fn summary_keys(args: &Args) -> Vec<SummaryKey> {
    args.titles
        .iter()
        .flat_map(|title| {
            args.types.iter().flat_map(move |t| {
                args.categories.iter().flat_map(move |category| {
                    args.sentiments.iter().map(move |sentiment| SummaryKey {
                        title: title.clone(),
                        comment_type: t.clone(),
                        category: category.clone(),
                        sentiment: sentiment.clone(),
                        start_date: args.start_date,
                        end_date: args.end_date,
                    })
                })
            })
        })
        .collect()
}

pub struct SummarizationHandler {
    analyses: Arc<dyn AnalysisRepository>,
    summaries: Arc<dyn SummaryRepository>,
    backend: Arc<dyn GenerationBackend>,
    policy: RetryPolicy,
    chunk_size: usize,
    min_comments: usize,
}

impl SummarizationHandler {
    pub fn new(
        analyses: Arc<dyn AnalysisRepository>,
        summaries: Arc<dyn SummaryRepository>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            analyses,
            summaries,
            backend,
            policy: RetryPolicy::from_env(),
            chunk_size: env_or("SUMMARY_CHUNK_SIZE", defaults::SUMMARY_CHUNK_SIZE),
            min_comments: env_or("SUMMARY_MIN_COMMENTS", defaults::SUMMARY_MIN_COMMENTS),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_min_comments(mut self, min_comments: usize) -> Self {
        self.min_comments = min_comments;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn run(&self, ctx: &JobContext) -> Result<SummarizationOutput> {
        let args: Args = ctx.args_as()?;
        if args.start_date > args.end_date {
            return Err(Error::InvalidInput(format!(
                "start_date {} is after end_date {}",
                args.start_date, args.end_date
            )));
        }

        let keys = summary_keys(&args);

        let mut output = SummarizationOutput {
            message: String::new(),
            data: Vec::new(),
            skipped: 0,
            failed: 0,
        };

        for (i, key) in keys.iter().enumerate() {
            ctx.report_progress((i * 100 / keys.len().max(1)) as i32, Some("Summarizing"));
            match self.summarize(key).await {
                Ok(Some(summary)) => output.data.push(summary),
                Ok(None) => output.skipped += 1,
                Err(e) => {
                    output.failed += 1;
                    warn!(
                        title = %key.title,
                        comment_type = %key.comment_type,
                        category = %key.category,
                        sentiment = %key.sentiment,
                        error = %e,
                        "Summarization failed for combination"
                    );
                }
            }
        }

        output.message = if output.data.is_empty() {
            "No data found for given filters and date range".to_string()
        } else {
            "Summarization completed".to_string()
        };
        info!(
            combinations = keys.len(),
            summarized = output.data.len(),
            skipped = output.skipped,
            failed = output.failed,
            "Summarization finished"
        );
        ctx.report_progress(100, Some("Summarization complete"));
        Ok(output)
    }

    /// Summarize one combination. `None` when it has too few comments.
    async fn summarize(&self, key: &SummaryKey) -> Result<Option<CommentSummary>> {
        let titles: Vec<String> = self
            .analyses
            .fetch_titles_for_summary(key)
            .await?
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect();
        if titles.len() < self.min_comments {
            debug!(count = titles.len(), "Too few comments to summarize");
            return Ok(None);
        }

        let ctx = SummaryContext {
            title: &key.title,
            comment_type: &key.comment_type,
            category: &key.category,
            sentiment: &key.sentiment,
        };

        let mut partials = Vec::new();
        for chunk in titles.chunks(self.chunk_size) {
            partials.push(summarize_chunk(self.backend.as_ref(), self.policy, ctx, chunk).await?);
        }

        let chunk_count = partials.len();
        let summary = if chunk_count > 1 {
            merge_summaries(self.backend.as_ref(), self.policy, ctx, &partials).await?
        } else {
            partials.remove(0)
        };

        let record = CommentSummary {
            key: key.clone(),
            comment_count: titles.len(),
            chunk_count,
            summary,
            processed_at: Utc::now(),
        };
        self.summaries.upsert_summary(&record).await?;
        Ok(Some(record))
    }
}

#[async_trait]
impl JobHandler for SummarizationHandler {
    fn kind(&self) -> JobKind {
        JobKind::Summarization
    }

    fn requires_exclusive(&self) -> bool {
        true
    }

    #[instrument(skip(self, ctx), fields(subsystem = "jobs", component = "summarization", op = "execute", task_id = %ctx.task_id, model = %self.backend.model_name()))]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        JobResult::from_result(self.run(&ctx).await)
    }
}

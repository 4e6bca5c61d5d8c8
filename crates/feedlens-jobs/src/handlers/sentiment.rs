//! Sentiment scoring job.
//!
//! With `app_ids`, scores those apps once no crawl is running; the wait
//! happens in `prepare`, before the inference lock is taken. Without,
//! re-runs duplicate detection and then scores every unscored comment.
//! Both modes fetch in batches of `limit` until nothing new comes back.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use feedlens_core::{
    defaults, CommentRepository, DuplicateDetector, Error, JobKind, Result, SentimentClassifier,
    SentimentSummary,
};

use super::duplicates::run_duplicate_detection;
use super::env_or;
use crate::gate::CrawlGate;
use crate::handler::{JobContext, JobHandler, JobResult};

#[derive(Debug, Default, Deserialize)]
struct Args {
    #[serde(default)]
    app_ids: Option<Vec<i64>>,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Default)]
struct Tally {
    processed: usize,
    failed: usize,
}

pub struct SentimentHandler {
    comments: Arc<dyn CommentRepository>,
    classifier: Arc<dyn SentimentClassifier>,
    crawl_gate: CrawlGate,
    detector: DuplicateDetector,
    batch_size: i64,
}

impl SentimentHandler {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        classifier: Arc<dyn SentimentClassifier>,
        crawl_gate: CrawlGate,
    ) -> Self {
        Self {
            comments,
            classifier,
            crawl_gate,
            detector: DuplicateDetector::default(),
            batch_size: env_or("SENTIMENT_BATCH_SIZE", defaults::SENTIMENT_BATCH_SIZE),
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn run(&self, ctx: &JobContext) -> Result<SentimentSummary> {
        let args: Args = ctx.args_as()?;
        let limit = args.limit.unwrap_or(self.batch_size);
        if limit <= 0 {
            return Err(Error::InvalidInput(format!("limit must be positive, got {limit}")));
        }

        let mut summary = SentimentSummary::default();
        match args.app_ids.filter(|ids| !ids.is_empty()) {
            Some(app_ids) => {
                for (i, app_id) in app_ids.iter().enumerate() {
                    ctx.report_progress(
                        (i * 100 / app_ids.len()) as i32,
                        Some("Scoring app comments"),
                    );
                    match self.score_until_exhausted(Some(&[*app_id]), limit).await {
                        Ok(tally) => {
                            summary.processed_comments += tally.processed;
                            summary.failed += tally.failed;
                        }
                        Err(e) => {
                            summary.failed += 1;
                            warn!(app_id, error = %e, "Sentiment scoring failed for app");
                        }
                    }
                }
            }
            None => {
                ctx.report_progress(5, Some("Flagging repetitive comments"));
                let flagged =
                    run_duplicate_detection(self.comments.as_ref(), &self.detector).await?;
                summary.flagged_repetitive = flagged as usize;

                ctx.report_progress(20, Some("Scoring comments"));
                let tally = self.score_until_exhausted(None, limit).await?;
                summary.processed_comments = tally.processed;
                summary.failed = tally.failed;
            }
        }

        ctx.report_progress(100, Some("Sentiment analysis complete"));
        info!(
            processed = summary.processed_comments,
            failed = summary.failed,
            flagged = summary.flagged_repetitive,
            "Sentiment analysis finished"
        );
        Ok(summary)
    }

    /// Fetch and score batches until a fetch returns nothing that has not
    /// already failed in this run.
    async fn score_until_exhausted(&self, app_ids: Option<&[i64]>, limit: i64) -> Result<Tally> {
        let mut tally = Tally::default();
        let mut failed_ids = HashSet::new();

        loop {
            let batch = self.comments.fetch_unscored(app_ids, limit).await?;
            let fresh: Vec<_> = batch
                .into_iter()
                .filter(|c| !failed_ids.contains(&c.id))
                .collect();
            if fresh.is_empty() {
                break;
            }
            debug!(batch_size = fresh.len(), "Scoring batch");

            for comment in fresh {
                let scored = match self.classifier.classify(comment.text()).await {
                    Ok(label) => self.comments.update_sentiment(comment.id, label).await,
                    Err(e) => Err(e),
                };
                match scored {
                    Ok(()) => tally.processed += 1,
                    Err(e) => {
                        warn!(comment_id = comment.id, error = %e, "Sentiment scoring failed");
                        failed_ids.insert(comment.id);
                        tally.failed += 1;
                    }
                }
            }
        }
        Ok(tally)
    }
}

#[async_trait]
impl JobHandler for SentimentHandler {
    fn kind(&self) -> JobKind {
        JobKind::Sentiment
    }

    fn requires_exclusive(&self) -> bool {
        true
    }

    async fn prepare(&self, ctx: &JobContext) {
        let per_app = ctx
            .args_as::<Args>()
            .map(|args| args.app_ids.is_some_and(|ids| !ids.is_empty()))
            .unwrap_or(false);
        if !per_app {
            return;
        }
        if self.crawl_gate.active() > 0 {
            info!(
                task_id = %ctx.task_id,
                active = self.crawl_gate.active(),
                "Waiting for crawls to finish"
            );
        }
        self.crawl_gate.wait_idle().await;
    }

    #[instrument(skip(self, ctx), fields(subsystem = "jobs", component = "sentiment", op = "execute", task_id = %ctx.task_id, model = %self.classifier.model_name()))]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        JobResult::from_result(self.run(&ctx).await)
    }
}

//! Comment ingestion job.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use feedlens_core::text::hash_identifier;
use feedlens_core::{CommentRepository, CommentSource, Error, JobKind, NewComment, Result};

use crate::gate::CrawlGate;
use crate::handler::{Admission, JobContext, JobHandler, JobResult};

#[derive(Debug, Deserialize)]
struct Args {
    app_ids: Vec<i64>,
}

/// Counters returned by a crawl task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub apps: usize,
    pub fetched: usize,
    pub inserted: u64,
    pub failed_apps: usize,
}

/// Pulls comments for each app and stores them with hashed user ids.
pub struct CrawlHandler {
    source: Arc<dyn CommentSource>,
    comments: Arc<dyn CommentRepository>,
    gate: CrawlGate,
}

impl CrawlHandler {
    pub fn new(
        source: Arc<dyn CommentSource>,
        comments: Arc<dyn CommentRepository>,
        gate: CrawlGate,
    ) -> Self {
        Self {
            source,
            comments,
            gate,
        }
    }

    async fn run(&self, ctx: &JobContext) -> Result<CrawlSummary> {
        let args: Args = ctx.args_as()?;
        if args.app_ids.is_empty() {
            return Err(Error::InvalidInput("app_ids must not be empty".into()));
        }

        let _pass = self.gate.enter();
        let mut summary = CrawlSummary {
            apps: args.app_ids.len(),
            ..Default::default()
        };

        for (i, &app_id) in args.app_ids.iter().enumerate() {
            ctx.report_progress((i * 100 / args.app_ids.len()) as i32, Some("Crawling"));
            match self.crawl_app(app_id).await {
                Ok((fetched, inserted)) => {
                    summary.fetched += fetched;
                    summary.inserted += inserted;
                    info!(app_id, fetched, inserted, "Crawled app comments");
                }
                Err(e) => {
                    summary.failed_apps += 1;
                    warn!(app_id, error = %e, "Crawl failed for app");
                }
            }
        }

        ctx.report_progress(100, Some("Crawl complete"));
        Ok(summary)
    }

    async fn crawl_app(&self, app_id: i64) -> Result<(usize, u64)> {
        let raw = self.source.fetch_comments(app_id).await?;
        let rows: Vec<NewComment> = raw
            .into_iter()
            .map(|c| NewComment {
                user_hash: hash_identifier(&c.user_id),
                app_id,
                title: c.title,
                description: c.description,
                grade: c.grade,
                created_at: c.created_at,
            })
            .collect();
        let inserted = self.comments.insert_comments(&rows).await?;
        Ok((rows.len(), inserted))
    }
}

#[async_trait]
impl JobHandler for CrawlHandler {
    fn kind(&self) -> JobKind {
        JobKind::Crawl
    }

    /// The gate closes as soon as the crawl is queued, so sentiment jobs
    /// submitted after it wait for its inserts.
    fn admit(&self, _args: &serde_json::Value) -> Option<Admission> {
        Some(Box::new(self.gate.enter()))
    }

    #[instrument(skip(self, ctx), fields(subsystem = "jobs", component = "crawl", op = "execute", task_id = %ctx.task_id))]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        JobResult::from_result(self.run(&ctx).await)
    }
}

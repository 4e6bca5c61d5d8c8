//! N-gram statistics job.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, instrument};

use feedlens_core::{
    defaults, CommentRepository, Error, JobKind, NgramExtractor, NgramFilter, NgramReport, Result,
};

use super::env_or;
use crate::handler::{JobContext, JobHandler, JobResult};

#[derive(Debug, Default, Deserialize)]
struct Args {
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default)]
    top_k: Option<usize>,
}

/// TF-IDF bigrams and trigrams over scored comments.
pub struct NgramHandler {
    comments: Arc<dyn CommentRepository>,
    extractor: NgramExtractor,
}

impl NgramHandler {
    /// Document-frequency bounds come from `NGRAM_MIN_DF` / `NGRAM_MAX_DF`.
    pub fn new(comments: Arc<dyn CommentRepository>) -> Self {
        let extractor = NgramExtractor::default()
            .with_min_df(env_or("NGRAM_MIN_DF", defaults::NGRAM_MIN_DF))
            .with_max_df(env_or("NGRAM_MAX_DF", defaults::NGRAM_MAX_DF));
        Self { comments, extractor }
    }

    pub fn with_extractor(mut self, extractor: NgramExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    async fn run(&self, ctx: &JobContext) -> Result<NgramReport> {
        let args: Args = ctx.args_as()?;
        let top_k = args.top_k.unwrap_or(self.extractor.top_k);
        if top_k == 0 {
            return Err(Error::InvalidInput("top_k must be positive".into()));
        }
        if let (Some(start), Some(end)) = (args.start_date, args.end_date) {
            if start > end {
                return Err(Error::InvalidInput(format!(
                    "start_date {start} is after end_date {end}"
                )));
            }
        }

        let sentiment = args
            .sentiment
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "all".to_string());
        let filter = NgramFilter {
            sentiment: (sentiment != "all").then(|| sentiment.clone()),
            start_date: args.start_date,
            end_date: args.end_date,
        };

        ctx.report_progress(10, Some("Fetching corpus"));
        let documents = self.comments.fetch_ngram_corpus(&filter).await?;

        ctx.report_progress(50, Some("Scoring n-grams"));
        let ngrams = self.extractor.clone().with_top_k(top_k).extract(&documents);
        info!(
            documents = documents.len(),
            ngrams = ngrams.len(),
            sentiment = %sentiment,
            "N-gram analysis finished"
        );

        ctx.report_progress(100, Some("N-gram analysis complete"));
        Ok(NgramReport {
            sentiment,
            document_count: documents.len(),
            ngrams,
        })
    }
}

#[async_trait]
impl JobHandler for NgramHandler {
    fn kind(&self) -> JobKind {
        JobKind::Ngram
    }

    #[instrument(skip(self, ctx), fields(subsystem = "jobs", component = "ngram", op = "execute", task_id = %ctx.task_id))]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        JobResult::from_result(self.run(&ctx).await)
    }
}

//! Job bodies, one handler per [`JobKind`](feedlens_core::JobKind).

mod comment_analysis;
mod crawl;
mod duplicates;
mod ngram;
mod sentiment;
mod summarization;

pub use comment_analysis::CommentAnalysisHandler;
pub use crawl::{CrawlHandler, CrawlSummary};
pub use duplicates::{run_duplicate_detection, DuplicateDetectionHandler};
pub use ngram::NgramHandler;
pub use sentiment::SentimentHandler;
pub use summarization::{SummarizationHandler, SummarizationOutput};

/// Read a positive number from the environment, or fall back to `default`.
pub(crate) fn env_or<T: std::str::FromStr + PartialOrd + Default>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .filter(|v| *v > T::default())
        .unwrap_or(default)
}
